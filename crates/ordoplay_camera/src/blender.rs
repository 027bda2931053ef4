// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-channel blend engine.
//!
//! The [`Blender`] merges two sources of blending:
//! - the native chain, driven by camera selection each tick
//! - a stack of client overrides (timelines, cutscenes) that take precedence
//!
//! Each tick it rebuilds a single "current" chain that observers query.

use crate::camera::{CameraId, CameraState, CameraStateSource};
use crate::chained::{BlendDuration, BlendFrame, ChainedBlend};
use crate::curve::{BlendCurve, BlendDefinition};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Handle for a client override slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OverrideId(pub u32);

/// A client-imposed blend between two cameras
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverrideFrame {
    /// Slot id
    pub id: OverrideId,
    /// Camera at weight 0; `None` blends from whatever is beneath
    pub cam_a: Option<CameraId>,
    /// Camera at weight 1
    pub cam_b: Option<CameraId>,
    /// Weight of `cam_b`, in [0, 1]
    pub weight_b: f32,
}

/// Externally visible summary of a channel's blend
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlendState {
    /// Camera currently being shown or blended in
    pub camera: Option<CameraId>,
    /// Weight of `camera`; 1 when not blending
    pub weight: f32,
    /// Camera being blended out, if blending
    pub outgoing_camera: Option<CameraId>,
    /// Blended camera state
    pub camera_state: CameraState,
}

/// Outcome of an undefined-blend resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveReport {
    /// Frames that received a definition
    pub resolved: usize,
    /// Frames still waiting for one
    pub unresolved: usize,
}

/// Override stack plus native blend chain for one channel
#[derive(Debug, Clone, Default)]
pub struct Blender {
    native: ChainedBlend,
    current: ChainedBlend,
    overrides: IndexMap<OverrideId, OverrideFrame>,
    last_override_id: u32,
}

impl Blender {
    /// Create an idle blender
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update an override slot.
    ///
    /// `None` allocates a fresh id. The returned id must be released with
    /// [`Blender::release_blendable_override`] or the slot stays on the stack.
    pub fn set_blendable_override(
        &mut self,
        id: Option<OverrideId>,
        cam_a: Option<CameraId>,
        cam_b: Option<CameraId>,
        weight_b: f32,
    ) -> OverrideId {
        let id = match id {
            Some(id) => {
                debug_assert!(id.0 > 0, "override ids start at 1");
                self.last_override_id = self.last_override_id.max(id.0);
                id
            }
            None => {
                self.last_override_id += 1;
                OverrideId(self.last_override_id)
            }
        };

        let frame = OverrideFrame {
            id,
            cam_a,
            cam_b,
            weight_b: weight_b.clamp(0.0, 1.0),
        };
        if self.overrides.insert(id, frame).is_none() {
            tracing::debug!("Override {:?} pushed ({} active)", id, self.overrides.len());
        }
        self.compute_current_blend();
        id
    }

    /// Remove an override slot; unknown ids are ignored
    pub fn release_blendable_override(&mut self, id: OverrideId) {
        if self.overrides.shift_remove(&id).is_some() {
            tracing::debug!("Override {:?} released ({} active)", id, self.overrides.len());
            self.compute_current_blend();
        }
    }

    /// Number of override slots currently held
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    /// Override slots, oldest first
    pub fn overrides(&self) -> impl Iterator<Item = &OverrideFrame> {
        self.overrides.values()
    }

    /// Reserve frame storage for the coming tick
    pub fn pre_update(&mut self) {
        let native = self.native.len() + 1;
        self.native.ensure_capacity(native);
        self.current.ensure_capacity(native + self.overrides.len() * 2);
    }

    /// Run one tick: switch the native chain to `desired`, advance it, rebuild the current blend
    pub fn update(&mut self, dt: f32, desired: Option<CameraId>) {
        self.update_native_frame(dt, desired);
        self.native.advance_blend(dt);
        self.compute_current_blend();
    }

    /// Point the native chain at `desired`.
    ///
    /// A live switch between two cameras pushes an undefined frame. When
    /// either side is `None` the newest frame is retargeted in place, so a
    /// blend in progress keeps running. An empty chain or a negative `dt`
    /// cuts.
    pub fn update_native_frame(&mut self, dt: f32, desired: Option<CameraId>) {
        if self.native.is_empty() {
            self.native.ensure_capacity(1);
            *self.native.push_empty() = BlendFrame::cut(desired);
            return;
        }

        let current = self.native_camera();
        if desired == current {
            return;
        }

        if dt < 0.0 {
            self.native.clear();
            self.native.ensure_capacity(1);
            *self.native.push_empty() = BlendFrame::cut(desired);
        } else if current.is_some() && desired.is_some() {
            self.native.ensure_capacity(self.native.len() + 1);
            *self.native.push_empty() = BlendFrame::undefined(desired);
        } else if let Some(frame) = self.native.frame_mut(0) {
            frame.camera = desired;
        }
    }

    /// Supply definitions for undefined native frames.
    ///
    /// `resolve` receives `(outgoing, incoming)` and may return `None` when no
    /// definition is available yet; such frames stay undefined. A frame whose
    /// new duration has already elapsed completes at once and the chain is
    /// truncated behind it.
    pub fn resolve_undefined_blends(
        &mut self,
        mut resolve: impl FnMut(Option<CameraId>, Option<CameraId>) -> Option<BlendDefinition>,
    ) -> ResolveReport {
        let mut report = ResolveReport::default();
        let mut truncate_at = None;

        for i in 0..self.native.len().saturating_sub(1) {
            let Some(outgoing) = self.native.frame(i + 1).map(|frame| frame.camera) else {
                break;
            };
            let Some(frame) = self.native.frame_mut(i) else {
                break;
            };
            if !frame.is_undefined() {
                continue;
            }

            match resolve(outgoing, frame.camera) {
                Some(blend) => {
                    frame.define(blend);
                    report.resolved += 1;
                    if frame.is_complete() {
                        truncate_at = Some(i + 1);
                        break;
                    }
                }
                None => report.unresolved += 1,
            }
        }

        if let Some(len) = truncate_at {
            self.native.truncate(len);
        }
        if report.resolved > 0 {
            self.compute_current_blend();
        }
        report
    }

    /// Rebuild the current blend from the override stack and the native chain.
    ///
    /// Overrides are applied newest first. An override with both cameras
    /// closes the stack; otherwise the native chain continues beneath.
    pub fn compute_current_blend(&mut self) {
        self.current.clear();

        let mut closed = false;
        for frame in self.overrides.values().rev() {
            match (frame.cam_a, frame.cam_b) {
                (cam_a, Some(cam_b)) => {
                    self.current.push_back(BlendFrame {
                        camera: Some(cam_b),
                        curve: BlendCurve::LINEAR,
                        duration: BlendDuration::Timed(1.0),
                        time_in_blend: frame.weight_b,
                    });
                    if cam_a.is_some() {
                        self.current.push_back(BlendFrame::cut(cam_a));
                        closed = true;
                        break;
                    }
                }
                (Some(cam_a), None) => {
                    self.current.push_back(BlendFrame {
                        camera: Some(cam_a),
                        curve: BlendCurve::LINEAR,
                        duration: BlendDuration::Inverted(1.0),
                        time_in_blend: frame.weight_b,
                    });
                }
                (None, None) => {}
            }
        }

        if !closed {
            self.current.extend_from(&self.native);
        }
    }

    /// Camera at the head of the native chain
    pub fn native_camera(&self) -> Option<CameraId> {
        self.native.frame(0).and_then(|frame| frame.camera)
    }

    /// Camera at the head of the current blend
    pub fn active_virtual_camera(&self) -> Option<CameraId> {
        self.current.frame(0).and_then(|frame| frame.camera)
    }

    /// Whether the current blend mixes more than one camera
    pub fn is_blending(&self) -> bool {
        self.current.len() > 1 && self.current.frame(0).is_some_and(|frame| !frame.is_complete())
    }

    /// Summary of the current blend, resolving states through `source`
    pub fn state(&self, source: &impl CameraStateSource) -> BlendState {
        let blending = self.is_blending();
        let head = self.current.frame(0);

        BlendState {
            camera: head.and_then(|frame| frame.camera),
            weight: match head {
                Some(frame) if blending => frame.blend_weight(),
                _ => 1.0,
            },
            outgoing_camera: if blending {
                self.current.frame(1).and_then(|frame| frame.camera)
            } else {
                None
            },
            camera_state: self.current.get_state(source),
        }
    }

    /// Whether `camera` contributes to the current blend
    pub fn uses(&self, camera: CameraId) -> bool {
        self.current.uses(camera)
    }

    /// Append the cameras contributing to the current blend to `out`
    pub fn live_cameras(&self, out: &mut Vec<CameraId>) {
        self.current.get_live_vcams(out);
    }

    /// Native frames still waiting for a definition
    pub fn unresolved_count(&self) -> usize {
        let frames = self.native.frames();
        frames[..frames.len().saturating_sub(1)]
            .iter()
            .filter(|frame| frame.is_undefined())
            .count()
    }

    /// Native chain
    pub fn native(&self) -> &ChainedBlend {
        &self.native
    }

    /// Current blend
    pub fn current(&self) -> &ChainedBlend {
        &self.current
    }
}
