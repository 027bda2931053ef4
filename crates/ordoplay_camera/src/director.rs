// SPDX-License-Identifier: MIT OR Apache-2.0
//! Camera director: owns the camera registry and every channel.
//!
//! ## Tick phases
//!
//! 1. Candidate collection from the registry (read-only)
//! 2. One task per channel, run in parallel: populate, sort, select, blend,
//!    resolve undefined blends, publish
//! 3. Activation events are gathered on the calling thread
//!
//! Channels share no mutable state, so step 2 needs no locking beyond the
//! per-channel [`BlendOutput`] that render threads read from.

use crate::blender::{BlendState, OverrideId};
use crate::camera::{CameraId, CameraRegistry};
use crate::channel::{BlendHook, Channel, ChannelBlendState, ChannelId, ChannelState, TimeMode};
use crate::config::{BlendRuleConfig, DirectorConfig};
use crate::curve::BlendDefinition;
use crate::error::DirectorError;
use crate::lookup::BlendEndpoint;
use indexmap::IndexMap;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::sync::Arc;

/// Raised when a channel's active camera changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraActivatedEvent {
    /// Channel the change happened on
    pub channel: ChannelId,
    /// Newly active camera
    pub incoming: Option<CameraId>,
    /// Previously active camera
    pub outgoing: Option<CameraId>,
    /// Whether the change was instantaneous
    pub is_cut: bool,
}

/// Health counters for a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelDiagnostics {
    /// Native blend frames still waiting for a definition
    pub unresolved_blends: usize,
    /// Override slots currently held by clients
    pub override_count: usize,
}

#[derive(Debug, Default)]
struct Published {
    tick: u64,
    state: BlendState,
}

/// A channel's blend state as of its last completed tick.
///
/// Cloning shares the same slot. Readers never observe a half-written tick:
/// the channel writes once, after its update has finished. Override changes
/// between ticks replace the state without bumping the tick counter.
#[derive(Debug, Clone, Default)]
pub struct BlendOutput {
    inner: Arc<RwLock<Published>>,
}

impl BlendOutput {
    /// Number of ticks published so far and the latest blend state
    pub fn snapshot(&self) -> (u64, BlendState) {
        let published = self.inner.read();
        (published.tick, published.state)
    }

    /// Number of ticks published so far
    pub fn tick(&self) -> u64 {
        self.inner.read().tick
    }

    fn publish(&self, state: BlendState) {
        let mut published = self.inner.write();
        published.tick += 1;
        published.state = state;
    }

    fn replace(&self, state: BlendState) {
        self.inner.write().state = state;
    }
}

#[derive(Debug)]
struct ChannelSlot {
    channel: Channel,
    state: ChannelState,
    blend: ChannelBlendState,
    clock: f32,
    output: BlendOutput,
    diagnostics: ChannelDiagnostics,
}

impl ChannelSlot {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            state: ChannelState::default(),
            blend: ChannelBlendState::new(),
            clock: 0.0,
            output: BlendOutput::default(),
            diagnostics: ChannelDiagnostics::default(),
        }
    }

    fn tick(
        &mut self,
        cameras: &CameraRegistry,
        dt: f32,
        unscaled_dt: f32,
        hook: Option<&BlendHook>,
    ) -> Option<CameraActivatedEvent> {
        let dt = match self.channel.time_mode {
            TimeMode::Scaled => dt,
            TimeMode::Unscaled => unscaled_dt,
        };
        if dt > 0.0 {
            self.clock += dt;
        }
        self.state.delta_time = dt;

        let previous = self.state.active_camera;
        self.blend.populate(&self.channel, cameras.candidates(self.channel.id));
        let update = self.blend.update(&self.channel, &mut self.state, self.clock, cameras, hook);

        let unresolved = self.blend.blender.unresolved_count();
        if unresolved > 0 && self.diagnostics.unresolved_blends == 0 {
            tracing::warn!(
                "{} has {} blend(s) with no definition; they will not finish until one is supplied",
                self.channel.id,
                unresolved
            );
        }
        self.diagnostics = ChannelDiagnostics {
            unresolved_blends: unresolved,
            override_count: self.blend.blender.override_count(),
        };

        self.output.publish(update.blend);
        tracing::trace!(
            "{} t={:.3} active={:?} weight={:.3}",
            self.channel.id,
            self.clock,
            update.blend.camera,
            update.blend.weight
        );

        self.activation_event(previous)
    }

    /// Bring the active camera and published state up to date after an
    /// override change outside the tick
    fn refresh(&mut self, cameras: &CameraRegistry) -> Option<CameraActivatedEvent> {
        let previous = self.state.active_camera;
        self.state.active_camera = self.blend.blender.active_virtual_camera();
        self.output.replace(self.blend.blender.state(cameras));
        self.diagnostics.override_count = self.blend.blender.override_count();
        self.activation_event(previous)
    }

    fn activation_event(&self, previous: Option<CameraId>) -> Option<CameraActivatedEvent> {
        let incoming = self.state.active_camera;
        (incoming != previous).then(|| CameraActivatedEvent {
            channel: self.channel.id,
            incoming,
            outgoing: previous,
            is_cut: !self.blend.blender.is_blending(),
        })
    }
}

/// Owns cameras and channels and runs the per-tick camera selection.
///
/// Activation events queue up until [`CameraDirector::take_events`] drains
/// them; a host that never drains them grows the queue by at most one event
/// per channel per tick or override change.
pub struct CameraDirector {
    cameras: CameraRegistry,
    channels: IndexMap<ChannelId, ChannelSlot>,
    blend_hook: Option<Arc<BlendHook>>,
    events: Vec<CameraActivatedEvent>,
}

impl CameraDirector {
    /// Create a director with no channels
    pub fn new() -> Self {
        Self {
            cameras: CameraRegistry::new(),
            channels: IndexMap::new(),
            blend_hook: None,
            events: Vec::new(),
        }
    }

    /// Create a director with the channels from a config.
    ///
    /// Custom blends name cameras, so they are installed separately with
    /// [`CameraDirector::install_blend_rules`] once the cameras exist.
    pub fn from_config(config: &DirectorConfig) -> Result<Self, DirectorError> {
        config.validate()?;
        let mut director = Self::new();
        for channel in &config.channels {
            director.add_channel(*channel)?;
        }
        Ok(director)
    }

    /// Add a channel
    pub fn add_channel(&mut self, channel: Channel) -> Result<(), DirectorError> {
        if self.channels.contains_key(&channel.id) {
            return Err(DirectorError::DuplicateChannel(channel.id));
        }
        tracing::debug!("Added {}", channel.id);
        self.channels.insert(channel.id, ChannelSlot::new(channel));
        Ok(())
    }

    /// Remove a channel, dropping its blends and overrides
    pub fn remove_channel(&mut self, id: ChannelId) -> Result<Channel, DirectorError> {
        self.channels
            .shift_remove(&id)
            .map(|slot| slot.channel)
            .ok_or(DirectorError::UnknownChannel(id))
    }

    /// Channel settings
    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id).map(|slot| &slot.channel)
    }

    /// Replace a channel's settings, keeping its blend state
    pub fn set_channel(&mut self, channel: Channel) -> Result<(), DirectorError> {
        self.slot_mut(channel.id)?.channel = channel;
        Ok(())
    }

    /// Ids of every channel, in creation order
    pub fn channel_ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.keys().copied()
    }

    /// Camera registry
    pub fn cameras(&self) -> &CameraRegistry {
        &self.cameras
    }

    /// Mutable camera registry, for controllers publishing states
    pub fn cameras_mut(&mut self) -> &mut CameraRegistry {
        &mut self.cameras
    }

    /// Register a camera on an existing channel
    pub fn register_camera(
        &mut self,
        name: impl Into<String>,
        channel: ChannelId,
        priority: i32,
    ) -> Result<CameraId, DirectorError> {
        if !self.channels.contains_key(&channel) {
            return Err(DirectorError::UnknownChannel(channel));
        }
        Ok(self.cameras.register(name, channel, priority))
    }

    /// Unregister a camera; channels stop considering it on the next tick
    pub fn unregister_camera(&mut self, id: CameraId) -> Result<(), DirectorError> {
        self.cameras.unregister(id)?;
        for slot in self.channels.values_mut() {
            if slot.state.solo_camera == Some(id) {
                slot.state.solo_camera = None;
            }
        }
        Ok(())
    }

    /// Add a custom blend rule to a channel
    pub fn add_blend_rule(
        &mut self,
        channel: ChannelId,
        from: impl Into<BlendEndpoint>,
        to: impl Into<BlendEndpoint>,
        blend: BlendDefinition,
    ) -> Result<(), DirectorError> {
        self.slot_mut(channel)?.blend.blend_lookup.add_rule(from, to, blend);
        Ok(())
    }

    /// Install named custom blends, returning how many were added.
    ///
    /// Every name must belong to a registered camera; nothing is installed
    /// if any rule fails.
    pub fn install_blend_rules(&mut self, rules: &[BlendRuleConfig]) -> Result<usize, DirectorError> {
        let mut resolved = Vec::with_capacity(rules.len());
        for rule in rules {
            if !self.channels.contains_key(&rule.channel) {
                return Err(DirectorError::UnknownChannel(rule.channel));
            }
            let from = self.endpoint(rule.from.as_deref())?;
            let to = self.endpoint(rule.to.as_deref())?;
            resolved.push((rule.channel, from, to, rule.blend));
        }

        for (channel, from, to, blend) in &resolved {
            self.add_blend_rule(*channel, *from, *to, *blend)?;
        }
        tracing::debug!("Installed {} custom blend(s)", resolved.len());
        Ok(resolved.len())
    }

    fn endpoint(&self, name: Option<&str>) -> Result<BlendEndpoint, DirectorError> {
        match name {
            None => Ok(BlendEndpoint::Any),
            Some(name) => self
                .cameras
                .find_by_name(name)
                .map(BlendEndpoint::Camera)
                .ok_or_else(|| DirectorError::UnknownCameraName(name.to_string())),
        }
    }

    /// Install a hook that can rewrite or defer blend definitions
    pub fn set_blend_hook(
        &mut self,
        hook: impl Fn(Option<CameraId>, Option<CameraId>, &BlendDefinition) -> Option<BlendDefinition>
            + Send
            + Sync
            + 'static,
    ) {
        let hook: Arc<BlendHook> = Arc::new(hook);
        self.blend_hook = Some(hook);
    }

    /// Remove the blend hook
    pub fn clear_blend_hook(&mut self) {
        self.blend_hook = None;
    }

    /// Force a camera active on a channel, or clear the solo with `None`
    pub fn set_solo(&mut self, channel: ChannelId, camera: Option<CameraId>) -> Result<(), DirectorError> {
        if let Some(camera) = camera {
            if !self.cameras.contains(camera) {
                return Err(DirectorError::StaleCamera(camera));
            }
        }
        self.slot_mut(channel)?.state.solo_camera = camera;
        Ok(())
    }

    /// Create or update a client override on a channel
    pub fn set_override(
        &mut self,
        channel: ChannelId,
        id: Option<OverrideId>,
        cam_a: Option<CameraId>,
        cam_b: Option<CameraId>,
        weight_b: f32,
    ) -> Result<OverrideId, DirectorError> {
        let slot = self.channels.get_mut(&channel).ok_or(DirectorError::UnknownChannel(channel))?;
        let id = slot.blend.blender.set_blendable_override(id, cam_a, cam_b, weight_b);
        let event = slot.refresh(&self.cameras);
        self.events.extend(event);
        Ok(id)
    }

    /// Release a client override; unknown ids are ignored
    pub fn release_override(&mut self, channel: ChannelId, id: OverrideId) -> Result<(), DirectorError> {
        let slot = self.channels.get_mut(&channel).ok_or(DirectorError::UnknownChannel(channel))?;
        slot.blend.blender.release_blendable_override(id);
        let event = slot.refresh(&self.cameras);
        self.events.extend(event);
        Ok(())
    }

    /// Advance every channel by one tick.
    ///
    /// `dt` drives scaled channels and `unscaled_dt` unscaled ones. A negative
    /// delta snaps the channel to its desired camera without blending.
    pub fn tick(&mut self, dt: f32, unscaled_dt: f32) {
        let cameras = &self.cameras;
        let hook = self.blend_hook.as_deref();

        let events: Vec<CameraActivatedEvent> = self
            .channels
            .par_values_mut()
            .filter_map(|slot| slot.tick(cameras, dt, unscaled_dt, hook))
            .collect();

        for event in &events {
            tracing::debug!(
                "{} activated {:?} (from {:?}, cut: {})",
                event.channel,
                event.incoming,
                event.outgoing,
                event.is_cut
            );
        }
        self.events.extend(events);
    }

    /// Drain the activation events raised since the last call.
    ///
    /// Call this once per frame; events are kept until drained.
    pub fn take_events(&mut self) -> Vec<CameraActivatedEvent> {
        std::mem::take(&mut self.events)
    }

    /// Camera at the head of a channel's current blend
    pub fn active_camera(&self, channel: ChannelId) -> Option<CameraId> {
        self.channels
            .get(&channel)
            .and_then(|slot| slot.blend.blender.active_virtual_camera())
    }

    /// Whether a channel is mid-blend
    pub fn is_blending(&self, channel: ChannelId) -> bool {
        self.channels
            .get(&channel)
            .is_some_and(|slot| slot.blend.blender.is_blending())
    }

    /// A channel's current blend, resolved against the latest camera states
    pub fn blend_state(&self, channel: ChannelId) -> Option<BlendState> {
        self.channels
            .get(&channel)
            .map(|slot| slot.blend.blender.state(&self.cameras))
    }

    /// Whether a camera contributes to any channel's current blend
    pub fn is_live(&self, camera: CameraId) -> bool {
        if !self.cameras.contains(camera) {
            tracing::warn!("is_live queried with stale camera handle {}", camera);
            return false;
        }
        self.channels
            .values()
            .any(|slot| slot.blend.blender.uses(camera))
    }

    /// Cameras contributing to a channel's current blend
    pub fn live_cameras(&self, channel: ChannelId) -> Vec<CameraId> {
        let mut live = Vec::new();
        if let Some(slot) = self.channels.get(&channel) {
            slot.blend.blender.live_cameras(&mut live);
        }
        live
    }

    /// Shared handle to a channel's published blend state
    pub fn output(&self, channel: ChannelId) -> Option<BlendOutput> {
        self.channels.get(&channel).map(|slot| slot.output.clone())
    }

    /// Health counters for a channel as of its last tick
    pub fn diagnostics(&self, channel: ChannelId) -> Option<ChannelDiagnostics> {
        self.channels.get(&channel).map(|slot| ChannelDiagnostics {
            override_count: slot.blend.blender.override_count(),
            ..slot.diagnostics
        })
    }

    /// Channel state as of its last tick
    pub fn channel_state(&self, channel: ChannelId) -> Option<&ChannelState> {
        self.channels.get(&channel).map(|slot| &slot.state)
    }

    fn slot_mut(&mut self, id: ChannelId) -> Result<&mut ChannelSlot, DirectorError> {
        self.channels.get_mut(&id).ok_or(DirectorError::UnknownChannel(id))
    }
}

impl Default for CameraDirector {
    fn default() -> Self {
        Self::new()
    }
}
