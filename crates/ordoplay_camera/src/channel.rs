// SPDX-License-Identifier: MIT OR Apache-2.0
//! Channels and the per-channel activation state machine.
//!
//! Each tick a channel picks the camera it wants (solo camera or the top of
//! its priority queue), holds that choice back while the activation delay or
//! the current camera's minimum duration has not elapsed, and hands the
//! result to its [`Blender`].

use crate::blender::{BlendState, Blender, ResolveReport};
use crate::camera::{CameraId, CameraStateSource};
use crate::curve::BlendDefinition;
use crate::lookup::BlendLookup;
use crate::queue::{PriorityQueue, PriorityQueueEntry, SortMode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an independent camera channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel {}", self.0)
    }
}

/// Projection used by a channel's output camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Projection {
    /// Perspective projection
    #[default]
    Perspective,
    /// Orthographic projection
    Orthographic,
}

/// Clock a channel runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeMode {
    /// Game time, affected by time scale
    #[default]
    Scaled,
    /// Real time, ignores time scale
    Unscaled,
}

/// Settings for a camera channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel {
    /// Channel id
    pub id: ChannelId,
    /// World up orientation (x, y, z, w)
    pub world_orientation: [f32; 4],
    /// Output aspect ratio
    pub aspect: f32,
    /// Output projection
    pub projection: Projection,
    /// Clock the channel runs on
    pub time_mode: TimeMode,
    /// How candidates are ranked
    pub sort_mode: SortMode,
    /// Seconds a new camera must stay on top before it activates
    pub activate_after: f32,
    /// Seconds a camera stays active before another may replace it
    pub min_duration: f32,
    /// Blend used when no custom rule matches
    pub default_blend: BlendDefinition,
}

impl Channel {
    /// Create a channel with default settings
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Set activation delay and minimum duration
    pub fn with_hysteresis(mut self, activate_after: f32, min_duration: f32) -> Self {
        self.activate_after = activate_after.max(0.0);
        self.min_duration = min_duration.max(0.0);
        self
    }

    /// Set the default blend
    pub fn with_default_blend(mut self, blend: BlendDefinition) -> Self {
        self.default_blend = blend;
        self
    }

    /// Set the time mode
    pub fn with_time_mode(mut self, time_mode: TimeMode) -> Self {
        self.time_mode = time_mode;
        self
    }

    /// Set the sort mode
    pub fn with_sort_mode(mut self, sort_mode: SortMode) -> Self {
        self.sort_mode = sort_mode;
        self
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            id: ChannelId(0),
            world_orientation: [0.0, 0.0, 0.0, 1.0],
            aspect: 16.0 / 9.0,
            projection: Projection::Perspective,
            time_mode: TimeMode::Scaled,
            sort_mode: SortMode::PriorityThenQuality,
            activate_after: 0.0,
            min_duration: 0.0,
            default_blend: BlendDefinition::default(),
        }
    }
}

/// Per-tick inputs and outputs of a channel
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelState {
    /// Seconds since last tick; negative means snap without blending
    pub delta_time: f32,
    /// Camera forced active, bypassing priority and hysteresis
    pub solo_camera: Option<CameraId>,
    /// Camera at the head of the current blend after the last tick
    pub active_camera: Option<CameraId>,
}

/// A camera waiting out the activation delay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingActivation {
    /// Camera that wants to become active
    pub camera: Option<CameraId>,
    /// Channel time it was first seen on top
    pub since: f32,
}

/// Host callback that can rewrite or defer the blend chosen for a transition.
///
/// Returning `None` leaves the blend undefined until a later tick.
pub type BlendHook =
    dyn Fn(Option<CameraId>, Option<CameraId>, &BlendDefinition) -> Option<BlendDefinition> + Send + Sync;

/// Result of one channel tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelUpdate {
    /// Blend after the tick
    pub blend: BlendState,
    /// Undefined-blend resolution outcome
    pub resolve: ResolveReport,
}

/// Mutable blending state owned by a channel
#[derive(Debug, Clone)]
pub struct ChannelBlendState {
    /// Blend engine
    pub blender: Blender,
    /// Custom blend rules
    pub blend_lookup: BlendLookup,
    /// Ranked candidates for this tick
    pub priority_queue: PriorityQueue,
    /// Channel time the native camera last changed
    pub activation_time: f32,
    /// Camera waiting to activate
    pub pending: Option<PendingActivation>,
}

impl ChannelBlendState {
    /// Create an idle state
    pub fn new() -> Self {
        Self {
            blender: Blender::new(),
            blend_lookup: BlendLookup::new(),
            priority_queue: PriorityQueue::new(),
            activation_time: f32::NEG_INFINITY,
            pending: None,
        }
    }

    /// Replace and rank this tick's candidates
    pub fn populate(&mut self, channel: &Channel, candidates: impl IntoIterator<Item = PriorityQueueEntry>) {
        self.priority_queue.populate(candidates);
        self.priority_queue.sort(channel.sort_mode);
    }

    /// Decide which camera the native chain should show at channel time `now`
    pub fn select_camera(&mut self, channel: &Channel, state: &ChannelState, now: f32) -> Option<CameraId> {
        let current = self.blender.native_camera();
        let (desired, mut activate_after, mut min_duration) = match state.solo_camera {
            Some(solo) => (Some(solo), 0.0, 0.0),
            None => (self.priority_queue.entity_at(0), channel.activate_after, channel.min_duration),
        };

        // Nothing on screen yet, or the editor is scrubbing: no hysteresis
        if current.is_none() || state.delta_time < 0.0 {
            activate_after = 0.0;
            min_duration = 0.0;
        }

        if desired == current {
            self.pending = None;
            return current;
        }

        let min_duration_open = now - self.activation_time < min_duration;
        match self.pending {
            Some(pending) if pending.camera == desired => {
                if now - pending.since < activate_after || min_duration_open {
                    return current;
                }
            }
            _ => {
                if activate_after > 0.0 || min_duration_open {
                    self.pending = Some(PendingActivation { camera: desired, since: now });
                    return current;
                }
            }
        }

        self.activation_time = now;
        self.pending = None;
        desired
    }

    /// Run one tick of selection and blending.
    ///
    /// Candidates must already have been supplied with [`ChannelBlendState::populate`].
    pub fn update(
        &mut self,
        channel: &Channel,
        state: &mut ChannelState,
        now: f32,
        source: &impl CameraStateSource,
        hook: Option<&BlendHook>,
    ) -> ChannelUpdate {
        self.blender.pre_update();

        let previous = self.blender.native_camera();
        let selected = self.select_camera(channel, state, now);
        if selected != previous {
            tracing::debug!("{} switching {:?} -> {:?}", channel.id, previous, selected);
        }

        self.blender.update(state.delta_time, selected);

        let lookup = &self.blend_lookup;
        let fallback = channel.default_blend;
        let resolve = self.blender.resolve_undefined_blends(|from, to| {
            let blend = lookup.resolve(from, to, fallback);
            match hook {
                Some(hook) => hook(from, to, &blend),
                None => Some(blend),
            }
        });

        state.active_camera = self.blender.active_virtual_camera();
        ChannelUpdate {
            blend: self.blender.state(source),
            resolve,
        }
    }
}

impl Default for ChannelBlendState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraRegistry, CameraState};
    use crate::chained::BlendDuration;
    use crate::curve::BlendCurve;

    struct Rig {
        channel: Channel,
        registry: CameraRegistry,
        blend: ChannelBlendState,
        state: ChannelState,
        now: f32,
    }

    impl Rig {
        fn new(channel: Channel) -> Self {
            Self {
                channel,
                registry: CameraRegistry::new(),
                blend: ChannelBlendState::new(),
                state: ChannelState::default(),
                now: 0.0,
            }
        }

        fn tick(&mut self, dt: f32) -> ChannelUpdate {
            self.tick_with_hook(dt, None)
        }

        fn tick_with_hook(&mut self, dt: f32, hook: Option<&BlendHook>) -> ChannelUpdate {
            if dt > 0.0 {
                self.now += dt;
            }
            self.state.delta_time = dt;
            self.blend
                .populate(&self.channel, self.registry.candidates(self.channel.id));
            self.blend
                .update(&self.channel, &mut self.state, self.now, &self.registry, hook)
        }

        fn native(&self) -> Option<CameraId> {
            self.blend.blender.native_camera()
        }
    }

    fn hysteresis_channel() -> Channel {
        Channel::new(ChannelId(0))
            .with_hysteresis(0.5, 1.0)
            .with_default_blend(BlendDefinition::new(BlendCurve::LINEAR, 2.0))
    }

    #[test]
    fn test_first_camera_activates_immediately() {
        let mut rig = Rig::new(hysteresis_channel());
        let a = rig.registry.register("A", ChannelId(0), 10);

        rig.tick(0.0);
        assert_eq!(rig.native(), Some(a));
        assert_eq!(rig.state.active_camera, Some(a));
        assert!(!rig.blend.blender.is_blending());
    }

    #[test]
    fn test_activation_delay_and_min_duration() {
        let mut rig = Rig::new(hysteresis_channel());
        let a = rig.registry.register("A", ChannelId(0), 10);
        let b = rig.registry.register("B", ChannelId(0), 0);

        let dt = 0.05;
        rig.tick(0.0);
        assert_eq!(rig.native(), Some(a));

        let mut switched_at = None;
        for step in 1..=30 {
            if step == 4 {
                rig.registry.set_priority(b, 20).unwrap();
            }
            rig.tick(dt);

            if rig.native() == Some(b) && switched_at.is_none() {
                switched_at = Some(rig.now);
                let native = rig.blend.blender.native();
                assert_eq!(native.len(), 2, "exactly one new blend frame");
                assert_eq!(native.frame(0).unwrap().duration, BlendDuration::Timed(2.0));
                assert_eq!(native.frame(1).unwrap().camera, Some(a));
            }
            if rig.now < 0.99 {
                assert_eq!(rig.native(), Some(a), "switched early at {}", rig.now);
            }
        }

        let switched_at = switched_at.expect("B never activated");
        assert!((0.99..1.06).contains(&switched_at), "switched at {switched_at}");
    }

    #[test]
    fn test_late_candidate_waits_for_activation_delay() {
        let mut rig = Rig::new(hysteresis_channel());
        let a = rig.registry.register("A", ChannelId(0), 10);
        let b = rig.registry.register("B", ChannelId(0), 0);

        let dt = 0.05;
        rig.tick(0.0);
        assert_eq!(rig.native(), Some(a));

        // B takes the top spot at 0.8s, inside A's minimum duration; the
        // activation delay then holds it back until 1.3s
        let mut switched_at = None;
        for step in 1..=40 {
            if step == 16 {
                rig.registry.set_priority(b, 20).unwrap();
            }
            rig.tick(dt);

            if rig.native() == Some(b) && switched_at.is_none() {
                switched_at = Some(rig.now);
            }
            if rig.now < 1.29 {
                assert_eq!(rig.native(), Some(a), "switched early at {}", rig.now);
            }
        }

        let switched_at = switched_at.expect("B never activated");
        assert!((1.29..1.36).contains(&switched_at), "switched at {switched_at}");
    }

    #[test]
    fn test_flicker_clears_pending() {
        let mut rig = Rig::new(Channel::new(ChannelId(0)).with_hysteresis(0.5, 0.0));
        let a = rig.registry.register("A", ChannelId(0), 10);
        let b = rig.registry.register("B", ChannelId(0), 0);
        rig.tick(0.0);

        rig.registry.set_priority(b, 20).unwrap();
        rig.tick(0.1);
        assert!(rig.blend.pending.is_some());

        rig.registry.set_priority(b, 0).unwrap();
        rig.tick(0.1);
        assert!(rig.blend.pending.is_none());

        // B comes back: the delay starts over
        rig.registry.set_priority(b, 20).unwrap();
        rig.tick(0.1);
        rig.tick(0.3);
        assert_eq!(rig.native(), Some(a));
        rig.tick(0.25);
        assert_eq!(rig.native(), Some(b));
    }

    #[test]
    fn test_solo_bypasses_hysteresis() {
        let mut rig = Rig::new(hysteresis_channel());
        let a = rig.registry.register("A", ChannelId(0), 10);
        let solo = rig.registry.register("Solo", ChannelId(0), -5);
        rig.tick(0.0);
        assert_eq!(rig.native(), Some(a));

        rig.state.solo_camera = Some(solo);
        rig.tick(0.01);
        assert_eq!(rig.native(), Some(solo));
    }

    #[test]
    fn test_negative_dt_switches_immediately() {
        let mut rig = Rig::new(hysteresis_channel());
        let _a = rig.registry.register("A", ChannelId(0), 10);
        let b = rig.registry.register("B", ChannelId(0), 0);
        rig.tick(0.0);

        rig.registry.set_priority(b, 20).unwrap();
        let update = rig.tick(-1.0);
        assert_eq!(rig.native(), Some(b));
        assert!(!rig.blend.blender.is_blending());
        assert_eq!(update.blend.camera, Some(b));
        assert_eq!(update.blend.weight, 1.0);
    }

    #[test]
    fn test_custom_rule_overrides_default_blend() {
        let mut rig = Rig::new(Channel::new(ChannelId(0)));
        let a = rig.registry.register("A", ChannelId(0), 10);
        let b = rig.registry.register("B", ChannelId(0), 0);
        rig.blend
            .blend_lookup
            .add_rule(a, b, BlendDefinition::new(BlendCurve::EASE_OUT, 0.5));
        rig.tick(0.0);

        rig.registry.set_priority(b, 20).unwrap();
        let update = rig.tick(0.1);
        let frame = rig.blend.blender.native().frame(0).copied().unwrap();
        assert_eq!(frame.duration, BlendDuration::Timed(0.5));
        assert_eq!(frame.curve, BlendCurve::EASE_OUT);
        assert_eq!(update.blend.outgoing_camera, Some(a));
    }

    #[test]
    fn test_hook_can_defer_resolution() {
        let mut rig = Rig::new(Channel::new(ChannelId(0)));
        let _a = rig.registry.register("A", ChannelId(0), 10);
        let b = rig.registry.register("B", ChannelId(0), 0);
        rig.tick(0.0);
        rig.registry.set_priority(b, 20).unwrap();

        let defer = |_: Option<CameraId>, _: Option<CameraId>, _: &BlendDefinition| -> Option<BlendDefinition> { None };
        let update = rig.tick_with_hook(0.1, Some(&defer));
        assert_eq!(update.resolve.unresolved, 1);
        assert!(rig.blend.blender.is_blending());

        let cut = |_: Option<CameraId>, _: Option<CameraId>, _: &BlendDefinition| Some(BlendDefinition::CUT);
        let update = rig.tick_with_hook(0.1, Some(&cut));
        assert_eq!(update.resolve.resolved, 1);
        assert!(!rig.blend.blender.is_blending());
        assert_eq!(update.blend.camera, Some(b));
    }

    #[test]
    fn test_losing_all_candidates() {
        let mut rig = Rig::new(Channel::new(ChannelId(0)));
        let a = rig.registry.register("A", ChannelId(0), 10);
        rig.tick(0.0);
        assert_eq!(rig.native(), Some(a));

        rig.registry.set_enabled(a, false).unwrap();
        let update = rig.tick(0.1);
        assert_eq!(rig.native(), None);
        assert_eq!(update.blend.camera, None);
        assert_eq!(update.blend.camera_state, CameraState::default());
    }
}
