//! Run diagnostics: timing and counts for every per-mask stage.
//!
//! These diagnostics are permanent instrumentation intended for tuning
//! the cleaner radius and feather settings. Every call to
//! [`run_with_diagnostics`](crate::run_with_diagnostics) collects them
//! alongside the results.
//!
//! Timestamps come from a caller-supplied [`Clock`] so that this crate
//! stays free of platform time sources. [`run`](crate::run) uses
//! [`NoClock`], which reports zero durations.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::feather::FeatherMethod;
use crate::types::BoundingBox;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Monotonic time source used to measure stage durations.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, (): &()) -> Duration {
        Duration::ZERO
    }
}

/// Diagnostics collected from a single orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// Per-mask diagnostics in the engine's original order.
    pub masks: Vec<MaskDiagnostics>,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all masks.
    pub summary: RunSummary,
}

/// Diagnostics for one candidate mask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskDiagnostics {
    /// Position in the engine's output order.
    pub index: usize,
    /// Engine confidence.
    pub score: f32,
    /// Stage 1: morphological cleaning.
    pub clean: StageDiagnostics,
    /// Stage 2: feathering.
    pub feather: StageDiagnostics,
    /// Stage 3: compositing.
    pub composite: StageDiagnostics,
    /// Stage 4: PNG encoding.
    pub encode: StageDiagnostics,
}

impl MaskDiagnostics {
    /// Sum of the four stage durations.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.clean.duration + self.feather.duration + self.composite.duration + self.encode.duration
    }
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Morphological cleaning metrics.
    Clean {
        /// Structuring-element radius.
        radius: u32,
        /// Foreground pixels in the raw mask.
        foreground_before: usize,
        /// Foreground pixels after open-then-close.
        foreground_after: usize,
    },
    /// Feathering metrics.
    Feather {
        /// Shaping curve used.
        method: FeatherMethod,
        /// Band width in pixels.
        width: u32,
        /// Pixels with alpha strictly between 0 and 1.
        band_pixel_count: usize,
    },
    /// Compositing metrics.
    Composite {
        /// Pixels with non-zero alpha.
        covered_pixel_count: usize,
        /// Bounds of the covered region.
        bounds: Option<BoundingBox>,
    },
    /// Encoding metrics.
    Encode {
        /// Size of the composited PNG.
        composited_bytes: usize,
        /// Size of the alpha-mask PNG.
        alpha_mask_bytes: usize,
    },
}

/// High-level summary for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Number of candidate masks processed.
    pub mask_count: usize,
    /// Highest score among the candidates, if any.
    pub best_score: Option<f32>,
}

impl RunDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Mask Pipeline Diagnostics\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)  |  Masks: {}",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.pixel_count,
            self.summary.mask_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));

        for mask in &self.masks {
            lines.push(String::new());
            lines.push(format!(
                "Mask #{} (score {:.4}, {:.3}ms)",
                mask.index,
                mask.score,
                duration_ms(mask.total_duration()),
            ));
            lines.push(format!("{:<12} {:>10}  {}", "Stage", "Duration", "Details"));
            lines.push("-".repeat(72));
            for (name, diag) in [
                ("Clean", &mask.clean),
                ("Feather", &mask.feather),
                ("Composite", &mask.composite),
                ("Encode", &mask.encode),
            ] {
                let ms = duration_ms(diag.duration);
                let details = format_metrics(&diag.metrics);
                lines.push(format!("{name:<12} {ms:>8.3}ms  {details}"));
            }
        }

        if let Some(best) = self.summary.best_score {
            lines.push(String::new());
            lines.push(format!("Best score: {best:.4}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Clean {
            radius,
            foreground_before,
            foreground_after,
        } => {
            format!("r={radius} fg={foreground_before}->{foreground_after}")
        }
        StageMetrics::Feather {
            method,
            width,
            band_pixel_count,
        } => format!("{method} w={width} band={band_pixel_count}"),
        StageMetrics::Composite {
            covered_pixel_count,
            bounds,
        } => match bounds {
            Some(b) => format!(
                "covered={covered_pixel_count} bbox=({},{})-({},{})",
                b.x_min, b.y_min, b.x_max, b.y_max,
            ),
            None => format!("covered={covered_pixel_count} bbox=none"),
        },
        StageMetrics::Encode {
            composited_bytes,
            alpha_mask_bytes,
        } => format!("preview={composited_bytes}B mask={alpha_mask_bytes}B"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    fn sample() -> RunDiagnostics {
        RunDiagnostics {
            masks: vec![MaskDiagnostics {
                index: 0,
                score: 0.93,
                clean: stage(
                    4,
                    StageMetrics::Clean {
                        radius: 4,
                        foreground_before: 120,
                        foreground_after: 118,
                    },
                ),
                feather: stage(
                    6,
                    StageMetrics::Feather {
                        method: FeatherMethod::Cosine,
                        width: 10,
                        band_pixel_count: 80,
                    },
                ),
                composite: stage(
                    2,
                    StageMetrics::Composite {
                        covered_pixel_count: 190,
                        bounds: None,
                    },
                ),
                encode: stage(
                    3,
                    StageMetrics::Encode {
                        composited_bytes: 900,
                        alpha_mask_bytes: 300,
                    },
                ),
            }],
            total_duration: Duration::from_millis(16),
            summary: RunSummary {
                image_width: 20,
                image_height: 20,
                pixel_count: 400,
                mask_count: 1,
                best_score: Some(0.93),
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn no_clock_reports_zero() {
        let clock = NoClock;
        let start = clock.now();
        assert_eq!(clock.elapsed(&start), Duration::ZERO);
    }

    #[test]
    fn mask_total_sums_stages() {
        let diag = sample();
        assert_eq!(diag.masks[0].total_duration(), Duration::from_millis(15));
    }

    #[test]
    fn report_produces_nonempty_string() {
        let report = sample().report();
        assert!(report.contains("Mask Pipeline Diagnostics"));
        assert!(report.contains("Mask #0"));
        assert!(report.contains("cosine w=10 band=80"));
        assert!(report.contains("fg=120->118"));
        assert!(report.contains("Best score"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        let total = json["total_duration"].as_f64().unwrap();
        assert!((total - 0.016).abs() < 1e-9);
        assert_eq!(json["masks"][0]["feather"]["metrics"]["Feather"]["method"], "cosine");
    }
}
