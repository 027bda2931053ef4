// SPDX-License-Identifier: MIT OR Apache-2.0
//! Virtual camera direction for OrdoPlay.
//!
//! This crate decides which virtual camera each output channel shows and how
//! it transitions between them:
//! - Priority queues of candidate cameras per channel
//! - Activation delay and minimum shot duration
//! - Chained blends that can interrupt each other
//! - Custom per-pair blend rules and a host blend hook
//! - Override slots for timelines and cutscenes
//!
//! ## Architecture
//!
//! The director is built on:
//! - A generational camera registry shared read-only by all channels
//! - One [`ChannelBlendState`] per channel, updated in parallel each tick
//! - A [`Blender`] per channel merging overrides over the native chain
//! - A published [`BlendOutput`] per channel for render threads

pub mod blender;
pub mod camera;
pub mod chained;
pub mod channel;
pub mod config;
pub mod curve;
pub mod director;
pub mod error;
pub mod lookup;
pub mod math;
pub mod queue;
pub mod shot_track;

pub use blender::{BlendState, Blender, OverrideFrame, OverrideId, ResolveReport};
pub use camera::{
    BlendHints, CameraId, CameraRecord, CameraRegistry, CameraState, CameraStateSource, LensSettings,
};
pub use chained::{BlendDuration, BlendFrame, ChainedBlend};
pub use channel::{
    BlendHook, Channel, ChannelBlendState, ChannelId, ChannelState, ChannelUpdate, PendingActivation,
    Projection, TimeMode,
};
pub use config::{BlendRuleConfig, ConfigError, DirectorConfig};
pub use curve::{BlendCurve, BlendDefinition};
pub use director::{BlendOutput, CameraActivatedEvent, CameraDirector, ChannelDiagnostics};
pub use error::DirectorError;
pub use lookup::{BlendEndpoint, BlendLookup, BlendRule};
pub use math::Interpolation;
pub use queue::{PriorityQueue, PriorityQueueEntry, SortMode};
pub use shot_track::{PlaybackState, ShotClip, ShotSample, ShotTrack, ShotTrackPlayer};
