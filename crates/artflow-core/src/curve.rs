//! Easing curves for fades
//!
//! A curve maps fade progress (elapsed fraction, 0.0-1.0) to an
//! interpolation weight. Curves are stateless.

use serde::{Deserialize, Serialize};

/// Easing curve used to interpolate a fade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueCurve {
    /// Constant speed
    #[default]
    Linear,
    /// Slow start (t²)
    EaseIn,
    /// Slow end (1 - (1 - t)²)
    EaseOut,
    /// Smoothstep ease in/out (3t² - 2t³)
    Smooth,
}

impl ValueCurve {
    /// Map progress to an interpolation weight.
    ///
    /// Progress is clamped to 0.0-1.0 first, so every curve returns 0.0 at
    /// (or before) the start and 1.0 at (or after) the end.
    pub fn apply(self, progress: f64) -> f64 {
        let t = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        match self {
            ValueCurve::Linear => t,
            ValueCurve::EaseIn => t * t,
            ValueCurve::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            ValueCurve::Smooth => t * t * (3.0 - 2.0 * t),
        }
    }

    /// Interpolate a single DMX slot from `start` to `target`.
    ///
    /// The result is rounded to the nearest integer and clamped to 0-255.
    pub fn interpolate(self, start: u8, target: u8, progress: f64) -> u8 {
        let start = f64::from(start);
        let delta = f64::from(target) - start;
        let value = (start + delta * self.apply(progress)).round();
        value.clamp(0.0, 255.0) as u8
    }

    /// Name used in configuration files
    pub fn name(self) -> &'static str {
        match self {
            ValueCurve::Linear => "linear",
            ValueCurve::EaseIn => "ease_in",
            ValueCurve::EaseOut => "ease_out",
            ValueCurve::Smooth => "smooth",
        }
    }
}
