//! Output correction curves
//!
//! Perceptual linearization applied to channel values right before a frame
//! is transmitted. Channel values themselves stay uncorrected so fades
//! interpolate in the linear domain.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Highest DMX slot value
pub const DMX_MAX: u8 = 255;

/// Nonlinear remapping of a raw 0-255 channel value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCorrection {
    /// Identity
    #[default]
    Linear,
    /// value² / max
    Quadratic,
    /// value³ / max²
    Cubic,
    /// value⁴ / max³
    Quadruple,
}

impl OutputCorrection {
    /// Exponent of the power curve
    pub fn exponent(self) -> i32 {
        match self {
            OutputCorrection::Linear => 1,
            OutputCorrection::Quadratic => 2,
            OutputCorrection::Cubic => 3,
            OutputCorrection::Quadruple => 4,
        }
    }

    /// Correct a raw slot value.
    ///
    /// The result is rounded and clamped to 0-255; both endpoints are fixed
    /// points of every curve.
    pub fn apply(self, value: u8) -> u8 {
        if self == OutputCorrection::Linear {
            return value;
        }
        let max = f64::from(DMX_MAX);
        let normalized = f64::from(value) / max;
        let corrected = (normalized.powi(self.exponent()) * max).round();
        corrected.clamp(0.0, max) as u8
    }

    /// Name used in configuration files
    pub fn name(self) -> &'static str {
        match self {
            OutputCorrection::Linear => "linear",
            OutputCorrection::Quadratic => "quadratic",
            OutputCorrection::Cubic => "cubic",
            OutputCorrection::Quadruple => "quadruple",
        }
    }

    /// All built-in curves
    pub fn all() -> [OutputCorrection; 4] {
        [
            OutputCorrection::Linear,
            OutputCorrection::Quadratic,
            OutputCorrection::Cubic,
            OutputCorrection::Quadruple,
        ]
    }
}

impl fmt::Display for OutputCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputCorrection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        OutputCorrection::all()
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| CoreError::UnknownCorrection(s.to_string()))
    }
}

/// Apply an optional correction, identity when unset
pub fn apply_optional(correction: Option<OutputCorrection>, value: u8) -> u8 {
    correction.map_or(value, |c| c.apply(value))
}

/// Lookup table from configuration name to correction curve.
///
/// Built once at startup and handed to setup code by reference; it is not
/// mutated once shared.
#[derive(Debug, Clone)]
pub struct CorrectionRegistry {
    curves: HashMap<String, OutputCorrection>,
}

impl CorrectionRegistry {
    /// Create a registry holding the built-in curves
    pub fn new() -> Self {
        let mut registry = Self {
            curves: HashMap::new(),
        };
        for curve in OutputCorrection::all() {
            registry.register(curve.name(), curve);
        }
        registry
    }

    /// Register a curve under an additional name
    pub fn register(&mut self, name: impl Into<String>, curve: OutputCorrection) {
        self.curves.insert(name.into(), curve);
    }

    /// Resolve an optional configuration name.
    ///
    /// `None` means "no correction" and resolves to `Ok(None)`; an unknown
    /// name is a configuration error.
    pub fn resolve(&self, name: Option<&str>) -> Result<Option<OutputCorrection>> {
        match name {
            None => Ok(None),
            Some(name) => self
                .curves
                .get(name)
                .copied()
                .map(Some)
                .ok_or_else(|| CoreError::UnknownCorrection(name.to_string())),
        }
    }

    /// Check whether a name is known
    pub fn contains(&self, name: &str) -> bool {
        self.curves.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.curves.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CorrectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_fixed() {
        for curve in OutputCorrection::all() {
            assert_eq!(curve.apply(0), 0);
            assert_eq!(curve.apply(255), 255);
        }
    }

    #[test]
    fn test_curve_values() {
        assert_eq!(OutputCorrection::Linear.apply(128), 128);
        // 128² / 255 = 64.25
        assert_eq!(OutputCorrection::Quadratic.apply(128), 64);
        // 128³ / 255² = 32.25
        assert_eq!(OutputCorrection::Cubic.apply(128), 32);
        // 128⁴ / 255³ = 16.19
        assert_eq!(OutputCorrection::Quadruple.apply(128), 16);
    }

    #[test]
    fn test_curves_are_monotonic() {
        for curve in OutputCorrection::all() {
            let mut last = 0;
            for v in 0..=255u8 {
                let out = curve.apply(v);
                assert!(out >= last, "{} not monotonic at {}", curve, v);
                last = out;
            }
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "cubic".parse::<OutputCorrection>().unwrap(),
            OutputCorrection::Cubic
        );
        assert!(matches!(
            "gamma".parse::<OutputCorrection>(),
            Err(CoreError::UnknownCorrection(_))
        ));
    }

    #[test]
    fn test_apply_optional() {
        assert_eq!(apply_optional(None, 128), 128);
        assert_eq!(apply_optional(Some(OutputCorrection::Quadratic), 128), 64);
    }

    #[test]
    fn test_registry_resolve() {
        let registry = CorrectionRegistry::new();
        assert_eq!(registry.resolve(None).unwrap(), None);
        assert_eq!(
            registry.resolve(Some("quadruple")).unwrap(),
            Some(OutputCorrection::Quadruple)
        );
        assert!(registry.resolve(Some("log")).is_err());
        assert_eq!(
            registry.names(),
            vec!["cubic", "linear", "quadratic", "quadruple"]
        );
    }

    #[test]
    fn test_registry_alias() {
        let mut registry = CorrectionRegistry::new();
        registry.register("gamma2", OutputCorrection::Quadratic);
        assert!(registry.contains("gamma2"));
        assert_eq!(
            registry.resolve(Some("gamma2")).unwrap(),
            Some(OutputCorrection::Quadratic)
        );
    }
}
