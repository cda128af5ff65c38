//! Fade-out curves for interrupting a stimulus track
//!
//! When the animal leaves a stimulus perch the current track is not cut
//! hard; its gain is ramped to zero over a short window. The curve decides
//! the shape of that ramp.

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Fade-out curve types
///
/// - Linear: Constant rate of change
/// - Logarithmic: Fast start, slow finish (natural-sounding fade-out)
/// - SCurve: Smooth acceleration and deceleration
/// - EqualPower: Constant perceived loudness drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// v(t) = 1 - t
    Linear,

    /// v(t) = (1-t)²
    #[default]
    Logarithmic,

    /// v(t) = 0.5 × (1 + cos(π × t))
    #[serde(alias = "cosine", alias = "s-curve")]
    SCurve,

    /// v(t) = cos(t × π/2)
    EqualPower,
}

impl FadeCurve {
    /// Calculate fade-out multiplier at given position
    ///
    /// # Arguments
    /// * `position` - Normalized position through fade (0.0 to 1.0)
    ///
    /// # Returns
    /// Volume multiplier (1.0 at start of the fade, 0.0 at the end)
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::Logarithmic => {
                let inv = 1.0 - t;
                inv * inv
            }
            FadeCurve::SCurve => 0.5 * (1.0 + (std::f32::consts::PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FadeCurve::Linear => "linear",
            FadeCurve::Logarithmic => "logarithmic",
            FadeCurve::SCurve => "s_curve",
            FadeCurve::EqualPower => "equal_power",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    const ALL: [FadeCurve; 4] = [
        FadeCurve::Linear,
        FadeCurve::Logarithmic,
        FadeCurve::SCurve,
        FadeCurve::EqualPower,
    ];

    #[derive(Deserialize)]
    struct Timing {
        fade_curve: FadeCurve,
    }

    fn from_toml(value: &str) -> std::result::Result<FadeCurve, toml::de::Error> {
        toml::from_str::<Timing>(&format!("fade_curve = \"{}\"", value)).map(|t| t.fade_curve)
    }

    #[test]
    fn test_fade_out_bounds() {
        for curve in ALL {
            let start_val = curve.calculate_fade_out(0.0);
            let end_val = curve.calculate_fade_out(1.0);
            assert!(
                (start_val - 1.0).abs() < 0.01,
                "{:?} fade-out at 0.0 should be ~1.0, got {}",
                curve,
                start_val
            );
            assert!(
                end_val.abs() < 0.01,
                "{:?} fade-out at 1.0 should be ~0.0, got {}",
                curve,
                end_val
            );
        }
    }

    #[test]
    fn test_fade_out_is_monotonic() {
        for curve in ALL {
            let mut previous = curve.calculate_fade_out(0.0);
            for step in 1..=20 {
                let value = curve.calculate_fade_out(step as f32 / 20.0);
                assert!(value <= previous + 1e-6, "{:?} rose at step {}", curve, step);
                previous = value;
            }
        }
    }

    #[test]
    fn test_position_is_clamped() {
        assert_eq!(FadeCurve::Linear.calculate_fade_out(-1.0), 1.0);
        assert_eq!(FadeCurve::Linear.calculate_fade_out(2.0), 0.0);
    }

    #[test]
    fn test_display_matches_config_name() {
        for curve in ALL {
            assert_eq!(from_toml(&curve.to_string()).unwrap(), curve);
        }
    }

    #[test]
    fn test_config_aliases() {
        assert_eq!(from_toml("cosine").unwrap(), FadeCurve::SCurve);
        assert_eq!(from_toml("s-curve").unwrap(), FadeCurve::SCurve);
        assert!(from_toml("exponential").is_err());
    }

    #[test]
    fn test_default_is_logarithmic() {
        assert_eq!(FadeCurve::default(), FadeCurve::Logarithmic);
    }
}
