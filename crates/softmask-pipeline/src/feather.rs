//! Feathering: turn a hard mask boundary into a smooth alpha ramp.
//!
//! The ramp is driven by the signed distance to the boundary
//! ([`crate::distance::signed_distance`]). With a feather width `w`, each
//! pixel's distance `d` is normalized to `u = (clamp(d / w, -1, 1) + 1) / 2`
//! and then shaped by one of a closed set of curves ([`FeatherMethod`]).
//!
//! Pixels at least `w` inside the mask get exactly `1.0`, pixels at least
//! `w` outside get exactly `0.0`, and only the band in between takes
//! intermediate values. Every curve maps `0 -> 0` and `1 -> 1` and is
//! non-decreasing, so "further inside" never means "more transparent".

use std::f64::consts::{LN_10, PI};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::distance::signed_distance;
use crate::types::{AlphaMask, CleanedMask, PipelineError};

/// Steepness of the exponential curve: `e^k = 100`, so the ramp starts at
/// roughly 1% of its final slope.
const EXPONENTIAL_STEEPNESS: f64 = 2.0 * LN_10;

/// Steepness of the logistic curve around its midpoint.
const SIGMOID_STEEPNESS: f64 = 12.0;

/// Selects which shaping curve maps normalized distance to alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum FeatherMethod {
    /// `f(u) = u`.
    Linear,
    /// `f(u) = (e^(k·u) - 1) / (e^k - 1)`: slow start, fast finish.
    Exponential,
    /// `f(u) = (1 - cos(π·u)) / 2`: zero slope at both ends.
    Cosine,
    /// Logistic centred at `u = 0.5`, rescaled to hit 0 and 1 exactly.
    Sigmoid,
    /// `f(u) = 1 - (1 - u)²`.
    EaseOutQuad,
    /// `f(u) = 1 - (1 - u)³`.
    EaseOutCubic,
    /// `f(u) = 1 - (1 - u)^p` with a configurable exponent `p`.
    #[default]
    EaseOutPower,
}

/// A shaping curve: `(u, exponent) -> alpha`. Only
/// [`FeatherMethod::EaseOutPower`] reads the exponent.
type Curve = fn(f64, f64) -> f64;

/// Indexed by `FeatherMethod as usize`.
const CURVES: [Curve; 7] = [
    linear,
    exponential,
    cosine,
    sigmoid,
    ease_out_quad,
    ease_out_cubic,
    ease_out_power,
];

impl FeatherMethod {
    /// Every method, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Linear,
        Self::Exponential,
        Self::Cosine,
        Self::Sigmoid,
        Self::EaseOutQuad,
        Self::EaseOutCubic,
        Self::EaseOutPower,
    ];

    /// Canonical kebab-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Exponential => "exponential",
            Self::Cosine => "cosine",
            Self::Sigmoid => "sigmoid",
            Self::EaseOutQuad => "ease-out-quad",
            Self::EaseOutCubic => "ease-out-cubic",
            Self::EaseOutPower => "ease-out-power",
        }
    }

    /// Evaluate the curve at `u`, clamped to `[0, 1]` on both sides.
    #[must_use]
    pub fn shape(self, u: f64, exponent: f64) -> f64 {
        let curve = CURVES[self as usize];
        curve(u.clamp(0.0, 1.0), exponent).clamp(0.0, 1.0)
    }
}

impl std::fmt::Display for FeatherMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatherMethod {
    type Err = PipelineError;

    /// Accepts the kebab-case names and their snake_case spellings,
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|m| m.name() == normalized)
            .ok_or_else(|| PipelineError::UnknownFeatherMethod(s.to_string()))
    }
}

impl TryFrom<String> for FeatherMethod {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FeatherMethod> for &'static str {
    fn from(method: FeatherMethod) -> Self {
        method.name()
    }
}

fn linear(u: f64, _: f64) -> f64 {
    u
}

fn exponential(u: f64, _: f64) -> f64 {
    (EXPONENTIAL_STEEPNESS * u).exp_m1() / EXPONENTIAL_STEEPNESS.exp_m1()
}

fn cosine(u: f64, _: f64) -> f64 {
    (1.0 - (PI * u).cos()) / 2.0
}

fn sigmoid(u: f64, _: f64) -> f64 {
    let logistic = |v: f64| 1.0 / (1.0 + (-SIGMOID_STEEPNESS * (v - 0.5)).exp());
    let low = logistic(0.0);
    let high = logistic(1.0);
    (logistic(u) - low) / (high - low)
}

fn ease_out_quad(u: f64, _: f64) -> f64 {
    1.0 - (1.0 - u).powi(2)
}

fn ease_out_cubic(u: f64, _: f64) -> f64 {
    1.0 - (1.0 - u).powi(3)
}

fn ease_out_power(u: f64, exponent: f64) -> f64 {
    1.0 - (1.0 - u).powf(exponent)
}

/// Feathering parameters: which curve, over how many pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatherConfig {
    /// Shaping curve applied inside the boundary band.
    pub method: FeatherMethod,

    /// Band half-width in pixels on each side of the boundary. `0` keeps
    /// the hard mask.
    pub width: u32,

    /// Exponent `p` for [`FeatherMethod::EaseOutPower`]. Must be finite
    /// and positive.
    pub exponent: f64,
}

impl FeatherConfig {
    /// Default shaping curve.
    pub const DEFAULT_METHOD: FeatherMethod = FeatherMethod::EaseOutPower;

    /// Default band width in pixels.
    pub const DEFAULT_WIDTH: u32 = 10;

    /// Default exponent for [`FeatherMethod::EaseOutPower`].
    pub const DEFAULT_EXPONENT: f64 = 3.0;

    /// Config for `method` over `width` pixels with the default exponent.
    #[must_use]
    pub const fn new(method: FeatherMethod, width: u32) -> Self {
        Self {
            method,
            width,
            exponent: Self::DEFAULT_EXPONENT,
        }
    }

    /// Replace the ease-out exponent.
    #[must_use]
    pub const fn with_exponent(mut self, exponent: f64) -> Self {
        self.exponent = exponent;
        self
    }

    /// Check the parameters before any pixel is touched.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `exponent` is not a
    /// finite positive number.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.exponent.is_finite() || self.exponent <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "feather exponent must be finite and positive, got {}",
                self.exponent,
            )));
        }
        Ok(())
    }
}

impl Default for FeatherConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_METHOD, Self::DEFAULT_WIDTH)
    }
}

/// Convert a cleaned hard mask into a feathered alpha mask.
///
/// A width of `0`, or a mask with no boundary inside the image (all
/// foreground or all background), yields the hard mask as `{0.0, 1.0}`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for an invalid exponent and
/// [`PipelineError::EmptyImage`] for a zero-sized mask, both before any
/// per-pixel work.
pub fn feather(mask: &CleanedMask, config: &FeatherConfig) -> Result<AlphaMask, PipelineError> {
    config.validate()?;
    if mask.dimensions().is_empty() {
        return Err(PipelineError::EmptyImage);
    }
    if config.width == 0 || mask.uniform_value().is_some() {
        return Ok(AlphaMask::from_binary(mask));
    }

    let width = f64::from(config.width);
    #[allow(clippy::cast_possible_truncation)]
    let values = signed_distance(mask)
        .into_iter()
        .map(|d| {
            let u = (d / width).clamp(-1.0, 1.0).midpoint(1.0);
            if u >= 1.0 {
                1.0
            } else if u <= 0.0 {
                0.0
            } else {
                config.method.shape(u, config.exponent) as f32
            }
        })
        .collect();

    Ok(AlphaMask::from_clamped(mask.dimensions(), values))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{BinaryMask, Dimensions};

    fn disk(size: u32, radius: f64) -> BinaryMask {
        let c = f64::from(size) / 2.0;
        BinaryMask::from_fn(size, size, |x, y| {
            let dx = f64::from(x) + 0.5 - c;
            let dy = f64::from(y) + 0.5 - c;
            dx.hypot(dy) <= radius
        })
    }

    #[test]
    fn curve_table_matches_declaration_order() {
        for (i, method) in FeatherMethod::ALL.into_iter().enumerate() {
            assert_eq!(method as usize, i);
        }
    }

    #[test]
    fn every_curve_pins_endpoints() {
        for method in FeatherMethod::ALL {
            assert_eq!(method.shape(0.0, 3.0), 0.0, "{method} at 0");
            assert_eq!(method.shape(1.0, 3.0), 1.0, "{method} at 1");
        }
    }

    #[test]
    fn every_curve_is_monotonic() {
        for method in FeatherMethod::ALL {
            for exponent in [0.5, 1.0, 3.0, 7.5] {
                let mut prev = method.shape(0.0, exponent);
                for step in 1..=1000 {
                    let u = f64::from(step) / 1000.0;
                    let value = method.shape(u, exponent);
                    assert!(
                        value >= prev,
                        "{method} decreases at u={u} (p={exponent}): {prev} -> {value}",
                    );
                    assert!((0.0..=1.0).contains(&value));
                    prev = value;
                }
            }
        }
    }

    #[test]
    fn curves_match_their_formulas_at_midpoint() {
        let at = |m: FeatherMethod| m.shape(0.5, 3.0);
        assert!((at(FeatherMethod::Linear) - 0.5).abs() < 1e-12);
        assert!((at(FeatherMethod::Cosine) - 0.5).abs() < 1e-12);
        assert!((at(FeatherMethod::Sigmoid) - 0.5).abs() < 1e-12);
        assert!((at(FeatherMethod::EaseOutQuad) - 0.75).abs() < 1e-12);
        assert!((at(FeatherMethod::EaseOutCubic) - 0.875).abs() < 1e-12);
        assert!((at(FeatherMethod::EaseOutPower) - 0.875).abs() < 1e-12);
        // (e^(k/2) - 1) / (e^k - 1) with e^k = 100 is 9 / 99.
        assert!((at(FeatherMethod::Exponential) - 9.0 / 99.0).abs() < 1e-12);
    }

    #[test]
    fn ease_out_power_reads_exponent() {
        let m = FeatherMethod::EaseOutPower;
        assert!((m.shape(0.5, 1.0) - 0.5).abs() < 1e-12);
        assert!((m.shape(0.5, 2.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn parse_accepts_kebab_and_snake_case() {
        assert_eq!(
            "ease-out-power".parse::<FeatherMethod>().unwrap(),
            FeatherMethod::EaseOutPower
        );
        assert_eq!(
            "EASE_OUT_CUBIC".parse::<FeatherMethod>().unwrap(),
            FeatherMethod::EaseOutCubic
        );
        for method in FeatherMethod::ALL {
            assert_eq!(method.to_string().parse::<FeatherMethod>().unwrap(), method);
        }
    }

    #[test]
    fn parse_rejects_unknown_method() {
        let err = "gaussian".parse::<FeatherMethod>().unwrap_err();
        assert!(matches!(err, PipelineError::UnknownFeatherMethod(ref s) if s == "gaussian"));
    }

    #[test]
    fn serde_uses_kebab_case_and_rejects_unknown() {
        let json = serde_json::to_string(&FeatherMethod::EaseOutQuad).unwrap();
        assert_eq!(json, "\"ease-out-quad\"");
        let back: FeatherMethod = serde_json::from_str("\"ease_out_quad\"").unwrap();
        assert_eq!(back, FeatherMethod::EaseOutQuad);
        assert!(serde_json::from_str::<FeatherMethod>("\"bogus\"").is_err());
    }

    #[test]
    fn default_config_is_ease_out_power_over_ten_pixels() {
        let config = FeatherConfig::default();
        assert_eq!(config.method, FeatherMethod::EaseOutPower);
        assert_eq!(config.width, 10);
        assert!((config.exponent - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_exponent_fails_before_pixel_work() {
        // A zero-sized mask would otherwise report EmptyImage; the config
        // error must win because it is checked first.
        let mask = BinaryMask::filled(Dimensions::new(0, 0), false);
        for exponent in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = FeatherConfig::default().with_exponent(exponent);
            assert!(matches!(
                feather(&mask, &config),
                Err(PipelineError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn zero_width_reproduces_hard_mask() {
        let mask = disk(24, 8.0);
        let alpha = feather(&mask, &FeatherConfig::new(FeatherMethod::Cosine, 0)).unwrap();
        assert_eq!(alpha, AlphaMask::from_binary(&mask));
    }

    #[test]
    fn boundary_band_is_contained() {
        let mask = disk(48, 14.0);
        let sd = signed_distance(&mask);
        for method in FeatherMethod::ALL {
            for width in [1, 3, 6] {
                let alpha = feather(&mask, &FeatherConfig::new(method, width)).unwrap();
                for (i, &a) in alpha.values().iter().enumerate() {
                    let w = f64::from(width);
                    if sd[i] >= w {
                        assert_eq!(a, 1.0, "{method} w={width} interior pixel {i}");
                    } else if sd[i] <= -w {
                        assert_eq!(a, 0.0, "{method} w={width} exterior pixel {i}");
                    } else {
                        assert!(a > 0.0 && a < 1.0, "{method} w={width} band pixel {i}");
                    }
                }
            }
        }
    }

    #[test]
    fn alpha_increases_towards_the_interior() {
        let mask = BinaryMask::from_fn(40, 1, |x, _| x < 20);
        let alpha = feather(&mask, &FeatherConfig::new(FeatherMethod::Linear, 8)).unwrap();
        let values = alpha.values();
        for pair in values.windows(2) {
            assert!(pair[0] >= pair[1], "alpha must fall moving outwards");
        }
        // One pixel inside and one outside sit symmetrically about 0.5.
        assert!((values[19] + values[20] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mask_without_boundary_is_uniform() {
        let d = Dimensions::new(4, 4);
        let config = FeatherConfig::new(FeatherMethod::Linear, 1);
        let full = feather(&BinaryMask::filled(d, true), &config).unwrap();
        assert!(full.values().iter().all(|&a| a == 1.0));
        let empty = feather(&BinaryMask::filled(d, false), &config).unwrap();
        assert!(empty.values().iter().all(|&a| a == 0.0));
    }
}
