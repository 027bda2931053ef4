// SPDX-License-Identifier: MIT OR Apache-2.0
//! Director errors.

use crate::camera::CameraId;
use crate::channel::ChannelId;
use crate::config::ConfigError;

/// Error raised by registry and director mutators
#[derive(Debug, thiserror::Error)]
pub enum DirectorError {
    /// Channel does not exist
    #[error("Unknown channel: {0}")]
    UnknownChannel(ChannelId),

    /// Channel id already in use
    #[error("Duplicate channel: {0}")]
    DuplicateChannel(ChannelId),

    /// Camera handle no longer refers to a live camera
    #[error("Stale camera handle: {0}")]
    StaleCamera(CameraId),

    /// No registered camera has this name
    #[error("Unknown camera name: {0}")]
    UnknownCameraName(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
