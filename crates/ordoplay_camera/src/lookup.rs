// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-pair custom blend rules.

use crate::camera::CameraId;
use crate::curve::BlendDefinition;

/// One side of a blend rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendEndpoint {
    /// Matches any camera, including none
    Any,
    /// Matches one camera
    Camera(CameraId),
}

impl BlendEndpoint {
    fn matches(&self, camera: Option<CameraId>) -> bool {
        match self {
            BlendEndpoint::Any => true,
            BlendEndpoint::Camera(id) => camera == Some(*id),
        }
    }

    fn is_exact(&self) -> bool {
        matches!(self, BlendEndpoint::Camera(_))
    }
}

impl From<CameraId> for BlendEndpoint {
    fn from(id: CameraId) -> Self {
        BlendEndpoint::Camera(id)
    }
}

impl From<Option<CameraId>> for BlendEndpoint {
    fn from(id: Option<CameraId>) -> Self {
        id.map_or(BlendEndpoint::Any, BlendEndpoint::Camera)
    }
}

/// A custom blend for transitions from one camera to another
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendRule {
    /// Outgoing camera
    pub from: BlendEndpoint,
    /// Incoming camera
    pub to: BlendEndpoint,
    /// Blend to use
    pub blend: BlendDefinition,
}

impl BlendRule {
    /// Specificity class, higher is more specific
    fn specificity(&self) -> u8 {
        match (self.from.is_exact(), self.to.is_exact()) {
            (true, true) => 3,
            (true, false) => 2,
            (false, true) => 1,
            (false, false) => 0,
        }
    }
}

/// Ordered list of custom blend rules
#[derive(Debug, Clone, Default)]
pub struct BlendLookup {
    rules: Vec<BlendRule>,
}

impl BlendLookup {
    /// Create an empty lookup
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule
    pub fn add_rule(&mut self, from: impl Into<BlendEndpoint>, to: impl Into<BlendEndpoint>, blend: BlendDefinition) {
        self.rules.push(BlendRule {
            from: from.into(),
            to: to.into(),
            blend,
        });
    }

    /// Remove every rule
    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// All rules in insertion order
    pub fn rules(&self) -> &[BlendRule] {
        &self.rules
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the lookup has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the blend for a transition.
    ///
    /// Preference: exact pair, then `(from, *)`, then `(*, to)`, then `(*, *)`,
    /// then `fallback`. Within a class the earliest rule wins.
    pub fn resolve(&self, from: Option<CameraId>, to: Option<CameraId>, fallback: BlendDefinition) -> BlendDefinition {
        let mut best: Option<(u8, &BlendRule)> = None;

        for rule in &self.rules {
            if !rule.from.matches(from) || !rule.to.matches(to) {
                continue;
            }
            let specificity = rule.specificity();
            if specificity == 3 {
                return rule.blend;
            }
            if best.map_or(true, |(found, _)| specificity > found) {
                best = Some((specificity, rule));
            }
        }

        best.map_or(fallback, |(_, rule)| rule.blend)
    }
}
