// SPDX-License-Identifier: MIT OR Apache-2.0
//! Director configuration.
//!
//! Configs are stored as RON:
//!
//! ```ron
//! (
//!     channels: [
//!         (id: 0, activate_after: 0.5, min_duration: 1.0,
//!          default_blend: (curve: (a: 0.0, b: 0.0, bias: 0.0), duration: 2.0)),
//!     ],
//!     custom_blends: [
//!         (channel: 0, from: Some("Wide"), to: None,
//!          blend: (curve: (a: 0.0, b: 0.0, bias: 0.0), duration: 0.5)),
//!     ],
//! )
//! ```

use crate::channel::{Channel, ChannelId};
use crate::curve::BlendDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Error loading or validating a config
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// RON could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON could not be written
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Values out of range
    #[error("Invalid config: {reason}")]
    Invalid {
        /// What is wrong
        reason: String,
    },
}

/// A custom blend between named cameras; `None` matches any camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendRuleConfig {
    /// Channel the rule belongs to
    pub channel: ChannelId,
    /// Outgoing camera name
    #[serde(default)]
    pub from: Option<String>,
    /// Incoming camera name
    #[serde(default)]
    pub to: Option<String>,
    /// Blend to use
    pub blend: BlendDefinition,
}

/// Channels and custom blends for a director
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    /// Channels to create
    pub channels: Vec<Channel>,
    /// Custom blend rules, in priority order
    pub custom_blends: Vec<BlendRuleConfig>,
}

impl DirectorConfig {
    /// Parse and validate a RON string
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: DirectorConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron_str(&source)
    }

    /// Serialize to pretty RON
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Write to a RON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    /// Check timings, curves and channel ids
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for channel in &self.channels {
            if !seen.insert(channel.id) {
                return Err(invalid(format!("{} declared twice", channel.id)));
            }
            if channel.activate_after < 0.0 || channel.min_duration < 0.0 {
                return Err(invalid(format!("{} has negative hysteresis", channel.id)));
            }
            if channel.aspect <= 0.0 {
                return Err(invalid(format!("{} has non-positive aspect", channel.id)));
            }
            validate_blend(&channel.default_blend, &format!("{} default blend", channel.id))?;
        }

        for rule in &self.custom_blends {
            if !seen.contains(&rule.channel) {
                return Err(invalid(format!("custom blend refers to unknown {}", rule.channel)));
            }
            let label = format!(
                "custom blend {} -> {}",
                rule.from.as_deref().unwrap_or("*"),
                rule.to.as_deref().unwrap_or("*")
            );
            validate_blend(&rule.blend, &label)?;
        }

        Ok(())
    }
}

fn validate_blend(blend: &BlendDefinition, label: &str) -> Result<(), ConfigError> {
    if blend.duration < 0.0 || !blend.duration.is_finite() {
        return Err(invalid(format!("{label} has invalid duration {}", blend.duration)));
    }
    if !blend.curve.is_well_formed() {
        return Err(invalid(format!("{label} has curve parameters out of range")));
    }
    Ok(())
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid { reason }
}
