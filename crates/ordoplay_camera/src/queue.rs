// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-channel ranking of candidate cameras.

use crate::camera::CameraId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Primary key used when ranking candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortMode {
    /// Priority first, shot quality breaks ties
    #[default]
    PriorityThenQuality,
    /// Shot quality first, priority breaks ties
    QualityThenPriority,
}

/// A candidate camera for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityQueueEntry {
    /// Candidate camera
    pub camera: CameraId,
    /// Priority, higher wins
    pub priority: i32,
    /// Allocation order, higher wins ties
    pub sequence: u64,
    /// Shot quality score
    pub quality: f32,
}

impl PriorityQueueEntry {
    /// Quality rounded up, so near-equal scores do not flap
    fn quality_key(&self) -> f32 {
        self.quality.ceil()
    }

    fn tie_break(&self, other: &Self) -> Ordering {
        other
            .sequence
            .cmp(&self.sequence)
            .then_with(|| other.camera.cmp(&self.camera))
    }

    /// Ordering that puts the better candidate first
    pub fn compare(&self, other: &Self, mode: SortMode) -> Ordering {
        let by_priority = other.priority.cmp(&self.priority);
        let by_quality = other.quality_key().total_cmp(&self.quality_key());

        match mode {
            SortMode::PriorityThenQuality => by_priority.then(by_quality),
            SortMode::QualityThenPriority => by_quality.then(by_priority),
        }
        .then_with(|| self.tie_break(other))
    }
}

/// Ranked candidates for a channel, rebuilt every tick
#[derive(Debug, Clone, Default)]
pub struct PriorityQueue {
    entries: Vec<PriorityQueueEntry>,
}

impl PriorityQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue contents
    pub fn populate(&mut self, entries: impl IntoIterator<Item = PriorityQueueEntry>) {
        self.entries.clear();
        self.entries.extend(entries);
    }

    /// Rank the entries in place, best first
    pub fn sort(&mut self, mode: SortMode) {
        self.entries.sort_unstable_by(|a, b| a.compare(b, mode));
    }

    /// Camera ranked at `index`, if any
    pub fn entity_at(&self, index: usize) -> Option<CameraId> {
        self.entries.get(index).map(|entry| entry.camera)
    }

    /// All entries in current order
    pub fn entries(&self) -> &[PriorityQueueEntry] {
        &self.entries
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no candidates
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: u32, priority: i32, sequence: u64, quality: f32) -> PriorityQueueEntry {
        PriorityQueueEntry {
            camera: CameraId::from_raw(index, 1),
            priority,
            sequence,
            quality,
        }
    }

    fn order(queue: &PriorityQueue) -> Vec<u32> {
        queue.entries().iter().map(|e| e.camera.index()).collect()
    }

    #[test]
    fn test_empty_queue() {
        let mut queue = PriorityQueue::new();
        queue.sort(SortMode::PriorityThenQuality);
        assert_eq!(queue.entity_at(0), None);
    }

    #[test]
    fn test_priority_beats_quality() {
        let mut queue = PriorityQueue::new();
        queue.populate([entry(0, 1, 5, 100.0), entry(1, 2, 1, 0.0)]);
        queue.sort(SortMode::PriorityThenQuality);
        assert_eq!(order(&queue), vec![1, 0]);
    }

    #[test]
    fn test_quality_uses_ceiling() {
        let mut queue = PriorityQueue::new();
        // 0.2 and 0.9 both round up to 1, so sequence decides
        queue.populate([entry(0, 1, 9, 0.2), entry(1, 1, 3, 0.9), entry(2, 1, 1, 1.5)]);
        queue.sort(SortMode::PriorityThenQuality);
        assert_eq!(order(&queue), vec![2, 0, 1]);
    }

    #[test]
    fn test_sequence_then_id_tie_break() {
        let mut queue = PriorityQueue::new();
        queue.populate([entry(0, 0, 1, 0.0), entry(1, 0, 2, 0.0), entry(3, 0, 2, 0.0)]);
        queue.sort(SortMode::PriorityThenQuality);
        assert_eq!(order(&queue), vec![3, 1, 0]);
    }

    #[test]
    fn test_quality_then_priority() {
        let mut queue = PriorityQueue::new();
        queue.populate([entry(0, 10, 1, 0.5), entry(1, 1, 1, 3.0), entry(2, 5, 1, 3.0)]);
        queue.sort(SortMode::QualityThenPriority);
        assert_eq!(order(&queue), vec![2, 1, 0]);
        assert_eq!(queue.entity_at(0).map(|c| c.index()), Some(2));
        assert_eq!(queue.entity_at(3), None);
    }

    #[test]
    fn test_populate_replaces() {
        let mut queue = PriorityQueue::new();
        queue.populate([entry(0, 0, 1, 0.0), entry(1, 0, 2, 0.0)]);
        queue.populate([entry(5, 0, 1, 0.0)]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.entity_at(0).map(|c| c.index()), Some(5));
    }
}
