// SPDX-License-Identifier: MIT OR Apache-2.0
//! Camera handles, camera state and the camera registry.
//!
//! Virtual cameras live in a generational arena. A [`CameraId`] is only valid
//! while its slot's generation matches, so handles held by a timeline or a
//! blend frame after the camera was removed resolve to nothing instead of
//! aliasing whatever camera reused the slot.

use crate::channel::ChannelId;
use crate::error::DirectorError;
use crate::math::Interpolation;
use crate::queue::PriorityQueueEntry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle identifying a virtual camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CameraId {
    index: u32,
    generation: u32,
}

impl CameraId {
    /// Build a handle from raw parts
    pub fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation the handle was issued for
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Lens parameters carried with a camera state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LensSettings {
    /// Vertical field of view in degrees
    pub field_of_view: f32,
    /// Half-height of the view volume for orthographic projection
    pub orthographic_size: f32,
    /// Near clip plane
    pub near_clip: f32,
    /// Far clip plane
    pub far_clip: f32,
    /// Roll around the view axis in degrees
    pub dutch: f32,
}

impl LensSettings {
    /// Interpolate every lens parameter
    pub fn lerp(&self, other: &LensSettings, t: f32) -> LensSettings {
        LensSettings {
            field_of_view: Interpolation::lerp(self.field_of_view, other.field_of_view, t),
            orthographic_size: Interpolation::lerp(self.orthographic_size, other.orthographic_size, t),
            near_clip: Interpolation::lerp(self.near_clip, other.near_clip, t),
            far_clip: Interpolation::lerp(self.far_clip, other.far_clip, t),
            dutch: Interpolation::lerp(self.dutch, other.dutch, t),
        }
    }
}

impl Default for LensSettings {
    fn default() -> Self {
        Self {
            field_of_view: 60.0,
            orthographic_size: 5.0,
            near_clip: 0.1,
            far_clip: 5000.0,
            dutch: 0.0,
        }
    }
}

/// Hints controlling how a state is blended with another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlendHints {
    /// Switch lens settings at the blend midpoint instead of interpolating
    pub snap_lens: bool,
}

/// Resolved output of a virtual camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    /// World-space position
    pub position: [f32; 3],
    /// World-space orientation quaternion (x, y, z, w)
    pub orientation: [f32; 4],
    /// Lens settings
    pub lens: LensSettings,
    /// Blend hints
    pub hints: BlendHints,
}

impl CameraState {
    /// Blend from `self` toward `other` by `t` in [0, 1]
    pub fn lerp(&self, other: &CameraState, t: f32) -> CameraState {
        let t = t.clamp(0.0, 1.0);
        let lens = if self.hints.snap_lens || other.hints.snap_lens {
            if t >= 0.5 { other.lens } else { self.lens }
        } else {
            self.lens.lerp(&other.lens, t)
        };

        CameraState {
            position: Interpolation::lerp_vec3(self.position, other.position, t),
            orientation: Interpolation::slerp(self.orientation, other.orientation, t),
            lens,
            hints: if t >= 0.5 { other.hints } else { self.hints },
        }
    }

    /// Create a state at a position with identity orientation
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            orientation: [0.0, 0.0, 0.0, 1.0],
            lens: LensSettings::default(),
            hints: BlendHints::default(),
        }
    }
}

/// Supplies resolved camera states on demand.
///
/// Implementations must be cheap and free of side effects; the blender may
/// call this several times per camera per tick.
pub trait CameraStateSource {
    /// Resolve the current state of a camera, `None` if it is unknown
    fn resolve_state(&self, camera: CameraId) -> Option<CameraState>;
}

impl<F> CameraStateSource for F
where
    F: Fn(CameraId) -> Option<CameraState>,
{
    fn resolve_state(&self, camera: CameraId) -> Option<CameraState> {
        self(camera)
    }
}

/// A registered virtual camera
#[derive(Debug, Clone)]
pub struct CameraRecord {
    /// Display name, used by custom blend rules
    pub name: String,
    /// Channel the camera competes on
    pub channel: ChannelId,
    /// Priority, higher wins
    pub priority: i32,
    /// Allocation order, higher is more recent
    pub sequence: u64,
    /// Shot quality score
    pub quality: f32,
    /// Disabled cameras are not candidates
    pub enabled: bool,
    /// Latest state published by the camera's controller
    pub state: CameraState,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    record: Option<CameraRecord>,
}

/// Generational arena of virtual cameras
#[derive(Debug, Clone, Default)]
pub struct CameraRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_sequence: u64,
}

impl CameraRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a camera and return its handle
    pub fn register(&mut self, name: impl Into<String>, channel: ChannelId, priority: i32) -> CameraId {
        let record = CameraRecord {
            name: name.into(),
            channel,
            priority,
            sequence: self.allocate_sequence(),
            quality: 0.0,
            enabled: true,
            state: CameraState::default(),
        };

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            return CameraId::from_raw(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            record: Some(record),
        });
        CameraId::from_raw(index, 1)
    }

    /// Remove a camera; its handle and any copies of it become stale
    pub fn unregister(&mut self, id: CameraId) -> Result<CameraRecord, DirectorError> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.record.is_some())
            .ok_or(DirectorError::StaleCamera(id))?;

        let record = slot.record.take().ok_or(DirectorError::StaleCamera(id))?;
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(id.index);
        Ok(record)
    }

    /// Whether the handle refers to a live camera
    pub fn contains(&self, id: CameraId) -> bool {
        self.get(id).is_some()
    }

    /// Get a camera record
    pub fn get(&self, id: CameraId) -> Option<&CameraRecord> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    /// Get a mutable camera record
    pub fn get_mut(&mut self, id: CameraId) -> Option<&mut CameraRecord> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_mut())
    }

    fn record_mut(&mut self, id: CameraId) -> Result<&mut CameraRecord, DirectorError> {
        self.get_mut(id).ok_or(DirectorError::StaleCamera(id))
    }

    /// Set a camera's priority
    pub fn set_priority(&mut self, id: CameraId, priority: i32) -> Result<(), DirectorError> {
        self.record_mut(id)?.priority = priority;
        Ok(())
    }

    /// Set a camera's shot quality
    pub fn set_quality(&mut self, id: CameraId, quality: f32) -> Result<(), DirectorError> {
        self.record_mut(id)?.quality = quality;
        Ok(())
    }

    /// Enable or disable a camera as a candidate
    pub fn set_enabled(&mut self, id: CameraId, enabled: bool) -> Result<(), DirectorError> {
        self.record_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Publish the state computed by a camera's controller
    pub fn set_state(&mut self, id: CameraId, state: CameraState) -> Result<(), DirectorError> {
        self.record_mut(id)?.state = state;
        Ok(())
    }

    /// Give a camera the newest sequence number so it wins exact ties
    pub fn prioritize(&mut self, id: CameraId) -> Result<(), DirectorError> {
        let sequence = self.allocate_sequence();
        self.record_mut(id)?.sequence = sequence;
        Ok(())
    }

    /// Find a live camera by name
    pub fn find_by_name(&self, name: &str) -> Option<CameraId> {
        self.iter().find(|(_, record)| record.name == name).map(|(id, _)| id)
    }

    /// Iterate over live cameras
    pub fn iter(&self) -> impl Iterator<Item = (CameraId, &CameraRecord)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.record
                .as_ref()
                .map(|record| (CameraId::from_raw(index as u32, slot.generation), record))
        })
    }

    /// Enabled cameras on a channel, as priority queue entries
    pub fn candidates(&self, channel: ChannelId) -> impl Iterator<Item = PriorityQueueEntry> + '_ {
        self.iter()
            .filter(move |(_, record)| record.enabled && record.channel == channel)
            .map(|(id, record)| PriorityQueueEntry {
                camera: id,
                priority: record.priority,
                sequence: record.sequence,
                quality: record.quality,
            })
    }

    /// Number of live cameras
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Whether no cameras are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn allocate_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }
}

impl CameraStateSource for CameraRegistry {
    fn resolve_state(&self, camera: CameraId) -> Option<CameraState> {
        self.get(camera).map(|record| record.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = CameraRegistry::new();
        let a = registry.register("Wide", ChannelId(0), 10);
        let b = registry.register("Close", ChannelId(0), 5);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a).map(|r| r.priority), Some(10));
        assert_eq!(registry.find_by_name("Close"), Some(b));
        assert!(registry.get(b).map(|r| r.sequence) > registry.get(a).map(|r| r.sequence));
    }

    #[test]
    fn test_stale_handle_after_unregister() {
        let mut registry = CameraRegistry::new();
        let a = registry.register("A", ChannelId(0), 0);
        registry.unregister(a).unwrap();

        let b = registry.register("B", ChannelId(0), 0);
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());

        assert!(registry.get(a).is_none());
        assert!(registry.resolve_state(a).is_none());
        assert!(matches!(registry.set_priority(a, 3), Err(DirectorError::StaleCamera(_))));
        assert!(matches!(registry.unregister(a), Err(DirectorError::StaleCamera(_))));
    }

    #[test]
    fn test_candidates_filter_channel_and_enabled() {
        let mut registry = CameraRegistry::new();
        let a = registry.register("A", ChannelId(0), 0);
        let b = registry.register("B", ChannelId(0), 0);
        let _c = registry.register("C", ChannelId(1), 0);
        registry.set_enabled(b, false).unwrap();

        let candidates: Vec<_> = registry.candidates(ChannelId(0)).collect();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].camera, a);
    }

    #[test]
    fn test_prioritize_bumps_sequence() {
        let mut registry = CameraRegistry::new();
        let a = registry.register("A", ChannelId(0), 0);
        let b = registry.register("B", ChannelId(0), 0);
        registry.prioritize(a).unwrap();

        let seq_a = registry.get(a).unwrap().sequence;
        let seq_b = registry.get(b).unwrap().sequence;
        assert!(seq_a > seq_b);
    }

    #[test]
    fn test_state_lerp_midpoint() {
        let a = CameraState::at([0.0, 0.0, 0.0]);
        let mut b = CameraState::at([10.0, 2.0, -4.0]);
        b.lens.field_of_view = 40.0;

        let mid = a.lerp(&b, 0.5);
        assert!(approx_eq(mid.position[0], 5.0, 1.0e-5));
        assert!(approx_eq(mid.position[1], 1.0, 1.0e-5));
        assert!(approx_eq(mid.position[2], -2.0, 1.0e-5));
        assert!(approx_eq(mid.lens.field_of_view, 50.0, 1.0e-4));
    }

    #[test]
    fn test_snap_lens_hint() {
        let a = CameraState::default();
        let mut b = CameraState::default();
        b.lens.field_of_view = 20.0;
        b.hints.snap_lens = true;

        assert_eq!(a.lerp(&b, 0.25).lens.field_of_view, 60.0);
        assert_eq!(a.lerp(&b, 0.75).lens.field_of_view, 20.0);
    }
}
