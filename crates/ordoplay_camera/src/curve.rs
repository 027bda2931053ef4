// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blend curves and blend definitions.

use crate::math::Interpolation;
use serde::{Deserialize, Serialize};

/// Parametric ease curve mapping normalized time to blend weight.
///
/// The curve is a one-dimensional cubic bezier with control values
/// `0, a, 1 - b, 1`, evaluated after `t` has been remapped through a bias
/// function. `a` controls the ease out of the outgoing camera, `b` the ease
/// into the incoming one. For `a, b` in [0, 1] the curve is monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendCurve {
    /// Tangent strength at the start, in [0, 1]
    pub a: f32,
    /// Tangent strength at the end, in [0, 1]
    pub b: f32,
    /// Skews the ease toward the start (negative) or the end (positive), in [-1, 1]
    pub bias: f32,
}

impl BlendCurve {
    /// Straight line
    pub const LINEAR: Self = Self::new(1.0 / 3.0, 1.0 / 3.0, 0.0);
    /// Smoothstep ease in and out
    pub const EASE_IN_OUT: Self = Self::new(0.0, 0.0, 0.0);
    /// Slow start
    pub const EASE_IN: Self = Self::new(0.0, 1.0 / 3.0, 0.0);
    /// Slow finish
    pub const EASE_OUT: Self = Self::new(1.0 / 3.0, 0.0, 0.0);
    /// Very slow start, steep finish
    pub const HARD_IN: Self = Self::new(0.0, 1.0, 0.0);
    /// Steep start, very slow finish
    pub const HARD_OUT: Self = Self::new(1.0, 0.0, 0.0);

    /// Create a curve from its parameters
    pub const fn new(a: f32, b: f32, bias: f32) -> Self {
        Self { a, b, bias }
    }

    /// Evaluate the curve at normalized time `t`
    pub fn evaluate(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let t = Interpolation::bias(t, (1.0 - self.bias) * 0.5);
        Interpolation::bezier(0.0, self.a, 1.0 - self.b, 1.0, t)
    }

    /// Whether the parameters are inside the range the curve is specified for
    pub fn is_well_formed(&self) -> bool {
        (0.0..=1.0).contains(&self.a) && (0.0..=1.0).contains(&self.b) && (-1.0..=1.0).contains(&self.bias)
    }
}

impl Default for BlendCurve {
    fn default() -> Self {
        Self::EASE_IN_OUT
    }
}

/// A curve plus the time it takes to run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendDefinition {
    /// Weight curve
    pub curve: BlendCurve,
    /// Duration in seconds; zero is a cut
    pub duration: f32,
}

impl BlendDefinition {
    /// Instantaneous cut
    pub const CUT: Self = Self {
        curve: BlendCurve::EASE_IN_OUT,
        duration: 0.0,
    };

    /// Create a blend definition; negative durations are treated as a cut
    pub fn new(curve: BlendCurve, duration: f32) -> Self {
        Self {
            curve,
            duration: duration.max(0.0),
        }
    }

    /// Whether this definition switches instantly
    pub fn is_cut(&self) -> bool {
        self.duration <= 0.0
    }
}

impl Default for BlendDefinition {
    fn default() -> Self {
        Self::new(BlendCurve::EASE_IN_OUT, 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    const PRESETS: [BlendCurve; 6] = [
        BlendCurve::LINEAR,
        BlendCurve::EASE_IN_OUT,
        BlendCurve::EASE_IN,
        BlendCurve::EASE_OUT,
        BlendCurve::HARD_IN,
        BlendCurve::HARD_OUT,
    ];

    #[test]
    fn test_endpoints_pinned() {
        for a in [0.0, 0.25, 0.5, 1.0] {
            for b in [0.0, 0.4, 1.0] {
                for bias in [-1.0, -0.5, 0.0, 0.5, 1.0] {
                    let curve = BlendCurve::new(a, b, bias);
                    assert!(approx_eq(curve.evaluate(0.0), 0.0, 1.0e-5), "{curve:?}");
                    assert!(approx_eq(curve.evaluate(1.0), 1.0, 1.0e-5), "{curve:?}");
                }
            }
        }
    }

    #[test]
    fn test_monotonic() {
        for a in [0.0, 0.3, 0.7, 1.0] {
            for b in [0.0, 0.3, 0.7, 1.0] {
                for bias in [-0.8, 0.0, 0.8] {
                    let curve = BlendCurve::new(a, b, bias);
                    let mut previous = curve.evaluate(0.0);
                    for i in 1..=200 {
                        let value = curve.evaluate(i as f32 / 200.0);
                        assert!(value + 1.0e-5 >= previous, "{curve:?} dips at step {i}");
                        previous = value;
                    }
                }
            }
        }
    }

    #[test]
    fn test_linear_preset_is_identity() {
        for i in 0..=10 {
            let t = i as f32 / 10.0;
            assert!(approx_eq(BlendCurve::LINEAR.evaluate(t), t, 1.0e-5));
        }
    }

    #[test]
    fn test_ease_in_out_is_symmetric() {
        let curve = BlendCurve::EASE_IN_OUT;
        assert!(approx_eq(curve.evaluate(0.5), 0.5, 1.0e-5));
        assert!(approx_eq(curve.evaluate(0.25), 1.0 - curve.evaluate(0.75), 1.0e-5));
    }

    #[test]
    fn test_bias_skews_midpoint() {
        let early = BlendCurve::new(1.0 / 3.0, 1.0 / 3.0, -0.5);
        let late = BlendCurve::new(1.0 / 3.0, 1.0 / 3.0, 0.5);
        assert!(early.evaluate(0.5) > 0.5);
        assert!(late.evaluate(0.5) < 0.5);
    }

    #[test]
    fn test_presets_well_formed() {
        assert!(PRESETS.iter().all(BlendCurve::is_well_formed));
        assert!(!BlendCurve::new(1.5, 0.0, 0.0).is_well_formed());
    }

    #[test]
    fn test_definition_clamps_negative_duration() {
        let def = BlendDefinition::new(BlendCurve::LINEAR, -3.0);
        assert_eq!(def.duration, 0.0);
        assert!(def.is_cut());
        assert!(!BlendDefinition::default().is_cut());
    }
}
