// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stacks of in-progress blends.
//!
//! A [`ChainedBlend`] holds blend frames newest first. Frame 0 is the camera
//! being blended in; frame `i + 1` is whatever was on screen when frame `i`
//! started, which may itself still be mid-blend.

use crate::camera::{CameraId, CameraState, CameraStateSource};
use crate::curve::{BlendCurve, BlendDefinition};

/// How long a frame takes and which way its weight runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendDuration {
    /// Weight rises from 0 to 1 over the duration; zero is a cut
    Timed(f32),
    /// Weight falls from 1 to 0 over the duration
    Inverted(f32),
    /// Not known yet; the frame never completes until it is resolved
    Undefined,
}

impl BlendDuration {
    /// Duration magnitude, if defined
    pub fn seconds(&self) -> Option<f32> {
        match self {
            BlendDuration::Timed(d) | BlendDuration::Inverted(d) => Some(d.abs()),
            BlendDuration::Undefined => None,
        }
    }
}

/// One blend in a chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendFrame {
    /// Camera blended in by this frame
    pub camera: Option<CameraId>,
    /// Weight curve
    pub curve: BlendCurve,
    /// Duration and direction
    pub duration: BlendDuration,
    /// Seconds elapsed since the frame started
    pub time_in_blend: f32,
}

impl BlendFrame {
    /// A completed cut to `camera`
    pub fn cut(camera: Option<CameraId>) -> Self {
        Self {
            camera,
            curve: BlendCurve::default(),
            duration: BlendDuration::Timed(0.0),
            time_in_blend: 0.0,
        }
    }

    /// A frame that still needs its definition
    pub fn undefined(camera: Option<CameraId>) -> Self {
        Self {
            camera,
            curve: BlendCurve::default(),
            duration: BlendDuration::Undefined,
            time_in_blend: 0.0,
        }
    }

    /// Whether the frame has run its full duration.
    ///
    /// Inverted frames fade toward the frames beneath them and never mask
    /// them, so they do not complete.
    pub fn is_complete(&self) -> bool {
        match self.duration {
            BlendDuration::Timed(d) => self.time_in_blend >= d.abs(),
            BlendDuration::Inverted(_) | BlendDuration::Undefined => false,
        }
    }

    /// Whether the frame is waiting for a definition
    pub fn is_undefined(&self) -> bool {
        self.duration == BlendDuration::Undefined
    }

    /// Weight of this frame's camera over the frames beneath it
    pub fn blend_weight(&self) -> f32 {
        match self.duration {
            BlendDuration::Timed(_) if self.is_complete() => 1.0,
            BlendDuration::Timed(d) => self.curve.evaluate(self.time_in_blend / d.abs()),
            BlendDuration::Inverted(d) if d.abs() <= f32::EPSILON => 0.0,
            BlendDuration::Inverted(d) => (1.0 - self.curve.evaluate(self.time_in_blend / d.abs())).clamp(0.0, 1.0),
            BlendDuration::Undefined => 0.0,
        }
    }

    /// Replace an undefined duration with a real definition
    pub fn define(&mut self, blend: BlendDefinition) {
        self.curve = blend.curve;
        self.duration = BlendDuration::Timed(blend.duration.max(0.0));
    }
}

impl Default for BlendFrame {
    fn default() -> Self {
        Self::cut(None)
    }
}

/// LIFO stack of blend frames, newest at index 0
#[derive(Debug, Clone, Default)]
pub struct ChainedBlend {
    frames: Vec<BlendFrame>,
}

impl ChainedBlend {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Make room for at least `capacity` frames.
    ///
    /// Runs in the single-writer phase of a tick, before frames are mutated.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        if let Some(extra) = capacity.checked_sub(self.frames.len()) {
            self.frames.reserve(extra);
        }
    }

    /// Shift every frame down one slot and insert a fresh frame at index 0
    pub fn push_empty(&mut self) -> &mut BlendFrame {
        debug_assert!(
            self.frames.capacity() > self.frames.len(),
            "ensure_capacity must run before push_empty"
        );
        self.frames.insert(0, BlendFrame::default());
        &mut self.frames[0]
    }

    /// Append a frame beneath the oldest one
    pub(crate) fn push_back(&mut self, frame: BlendFrame) {
        self.frames.push(frame);
    }

    /// Append every frame of another chain beneath the oldest one
    pub(crate) fn extend_from(&mut self, other: &ChainedBlend) {
        self.frames.extend_from_slice(&other.frames);
    }

    /// Advance every live frame by `dt`, dropping frames hidden by a completed one.
    ///
    /// A negative `dt` snaps: only the newest frame survives.
    pub fn advance_blend(&mut self, dt: f32) {
        if dt < 0.0 {
            self.frames.truncate(1);
            return;
        }

        let mut keep = self.frames.len();
        for (i, frame) in self.frames.iter_mut().enumerate() {
            frame.time_in_blend += dt;
            if frame.is_complete() {
                keep = i + 1;
                break;
            }
        }
        self.frames.truncate(keep);
    }

    /// Truncate the chain to `len` frames
    pub fn truncate(&mut self, len: usize) {
        self.frames.truncate(len);
    }

    /// Remove every frame
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Blend the cameras in the chain into one state.
    ///
    /// Walks from the oldest frame to the newest, lerping toward each newer
    /// camera by its frame's weight. Cameras that do not resolve are skipped.
    pub fn get_state(&self, source: &impl CameraStateSource) -> CameraState {
        let live = self.live_len();
        let mut state: Option<CameraState> = None;

        for frame in self.frames[..live].iter().rev() {
            let Some(resolved) = frame.camera.and_then(|camera| source.resolve_state(camera)) else {
                continue;
            };
            state = Some(match state {
                Some(previous) => previous.lerp(&resolved, frame.blend_weight()),
                None => resolved,
            });
        }

        state.unwrap_or_default()
    }

    /// Frames up to and including the first complete one
    fn live_len(&self) -> usize {
        self.frames
            .iter()
            .position(BlendFrame::is_complete)
            .map_or(self.frames.len(), |i| i + 1)
    }

    /// Whether any live frame shows `camera`
    pub fn uses(&self, camera: CameraId) -> bool {
        self.frames[..self.live_len()]
            .iter()
            .any(|frame| frame.camera == Some(camera))
    }

    /// Append every distinct camera in the live frames to `out`
    pub fn get_live_vcams(&self, out: &mut Vec<CameraId>) {
        for frame in &self.frames[..self.live_len()] {
            if let Some(camera) = frame.camera {
                if !out.contains(&camera) {
                    out.push(camera);
                }
            }
        }
    }

    /// Frame at `index`
    pub fn frame(&self, index: usize) -> Option<&BlendFrame> {
        self.frames.get(index)
    }

    /// Mutable frame at `index`
    pub fn frame_mut(&mut self, index: usize) -> Option<&mut BlendFrame> {
        self.frames.get_mut(index)
    }

    /// All frames, newest first
    pub fn frames(&self) -> &[BlendFrame] {
        &self.frames
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    fn cam(index: u32) -> CameraId {
        CameraId::from_raw(index, 1)
    }

    fn source(camera: CameraId) -> Option<CameraState> {
        Some(CameraState::at([camera.index() as f32 * 10.0, 0.0, 0.0]))
    }

    fn timed(camera: u32, duration: f32) -> BlendFrame {
        BlendFrame {
            camera: Some(cam(camera)),
            curve: BlendCurve::LINEAR,
            duration: BlendDuration::Timed(duration),
            time_in_blend: 0.0,
        }
    }

    fn push(chain: &mut ChainedBlend, frame: BlendFrame) {
        chain.ensure_capacity(chain.len() + 1);
        *chain.push_empty() = frame;
    }

    #[test]
    fn test_push_empty_shifts_frames() {
        let mut chain = ChainedBlend::new();
        push(&mut chain, timed(1, 0.0));
        push(&mut chain, timed(2, 1.0));

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.frame(0).and_then(|f| f.camera), Some(cam(2)));
        assert_eq!(chain.frame(1).and_then(|f| f.camera), Some(cam(1)));
    }

    #[test]
    fn test_advance_completes_and_prunes() {
        let mut chain = ChainedBlend::new();
        push(&mut chain, timed(1, 0.0));
        push(&mut chain, timed(2, 3.0));
        push(&mut chain, timed(3, 1.0));
        assert_eq!(chain.len(), 3);

        chain.advance_blend(1.0);
        assert!(chain.frame(0).unwrap().is_complete());
        assert_eq!(chain.len(), 1);
        assert!(chain.frame(1).is_none());
    }

    #[test]
    fn test_advance_prunes_behind_first_complete() {
        let mut chain = ChainedBlend::new();
        push(&mut chain, timed(1, 0.0));
        push(&mut chain, timed(2, 0.5));
        push(&mut chain, timed(3, 2.0));

        chain.advance_blend(0.5);
        // cam3 still blending in over cam2, which just finished over cam1
        assert_eq!(chain.len(), 2);
        assert!(!chain.frame(0).unwrap().is_complete());
        assert!(chain.frame(1).unwrap().is_complete());
    }

    #[test]
    fn test_negative_dt_snaps() {
        let mut chain = ChainedBlend::new();
        push(&mut chain, timed(1, 0.0));
        push(&mut chain, timed(2, 2.0));
        chain.advance_blend(-1.0);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.frame(0).and_then(|f| f.camera), Some(cam(2)));
    }

    #[test]
    fn test_undefined_never_completes() {
        let mut chain = ChainedBlend::new();
        push(&mut chain, timed(1, 0.0));
        push(&mut chain, BlendFrame::undefined(Some(cam(2))));

        chain.advance_blend(1.0e6);
        assert_eq!(chain.len(), 2);
        assert!(!chain.frame(0).unwrap().is_complete());
        assert_eq!(chain.frame(0).unwrap().blend_weight(), 0.0);
    }

    #[test]
    fn test_blend_weights() {
        let mut frame = timed(1, 2.0);
        frame.time_in_blend = 0.5;
        assert!(approx_eq(frame.blend_weight(), 0.25, 1.0e-5));

        frame.time_in_blend = 2.0;
        assert_eq!(frame.blend_weight(), 1.0);

        let inverted = BlendFrame {
            duration: BlendDuration::Inverted(1.0),
            time_in_blend: 0.25,
            ..timed(1, 1.0)
        };
        assert!(approx_eq(inverted.blend_weight(), 0.75, 1.0e-5));
        assert!(!inverted.is_complete());
    }

    #[test]
    fn test_get_state_nested() {
        let mut chain = ChainedBlend::new();
        push(&mut chain, timed(0, 0.0));
        push(&mut chain, timed(1, 2.0));
        chain.frame_mut(0).unwrap().time_in_blend = 1.0;
        push(&mut chain, timed(2, 2.0));
        chain.frame_mut(0).unwrap().time_in_blend = 1.0;

        // cam0 (x=0) -> cam1 (x=10) at 0.5 = 5, then -> cam2 (x=20) at 0.5 = 12.5
        let state = chain.get_state(&source);
        assert!(approx_eq(state.position[0], 12.5, 1.0e-4));
    }

    #[test]
    fn test_get_state_skips_unresolved() {
        let mut chain = ChainedBlend::new();
        push(&mut chain, timed(3, 0.0));
        push(&mut chain, timed(4, 1.0));
        chain.frame_mut(0).unwrap().time_in_blend = 0.5;

        let only_three = |camera: CameraId| (camera.index() == 3).then(|| CameraState::at([1.0, 2.0, 3.0]));
        assert_eq!(chain.get_state(&only_three).position, [1.0, 2.0, 3.0]);

        let nothing = |_: CameraId| -> Option<CameraState> { None };
        assert_eq!(chain.get_state(&nothing), CameraState::default());
    }

    #[test]
    fn test_live_cameras() {
        let mut chain = ChainedBlend::new();
        push(&mut chain, timed(1, 0.0));
        push(&mut chain, timed(2, 1.0));

        let mut live = Vec::new();
        chain.get_live_vcams(&mut live);
        assert_eq!(live, vec![cam(2), cam(1)]);
        assert!(chain.uses(cam(1)));
        assert!(!chain.uses(cam(7)));
    }
}
