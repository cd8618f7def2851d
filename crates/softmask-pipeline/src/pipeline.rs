//! Mask orchestration: clean, feather, composite and encode every
//! candidate mask, then rank the results by score.
//!
//! [`run`] is the one-call entry point. Each candidate moves through a
//! chain of stage types that can also be driven by hand:
//!
//! ```rust
//! # use softmask_pipeline::{
//! #     BinaryMask, Background, FeatherConfig, Pending, PipelineError, Proposal, RgbaImage,
//! # };
//! # fn demo(source: &RgbaImage, mask: BinaryMask) -> Result<(), PipelineError> {
//! let result = Pending::new(0, Proposal::new(mask, 0.9))
//!     .clean(4)?
//!     .feather(&FeatherConfig::default())?
//!     .composite(source, Background::Transparent)?
//!     .encode()?;
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state. The
//! caller can inspect the current intermediate through accessors before
//! advancing.
//!
//! Candidates are independent, so [`run`] processes them on the rayon
//! thread pool. Results are gathered before ranking; the ranking is a
//! stable sort, so ties keep the engine's original order.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::composite::{Background, bounding_box};
use crate::diagnostics::{
    Clock, MaskDiagnostics, NoClock, RunDiagnostics, RunSummary, StageDiagnostics, StageMetrics,
};
use crate::feather::FeatherConfig;
use crate::types::{
    AlphaMask, BoundingBox, CleanedMask, Dimensions, MaskResult, PipelineConfig, PipelineError,
    Proposal, RawMask, RgbaImage,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// A candidate mask as it came from the engine.
///
/// Call [`clean`](Self::clean) to advance.
#[must_use = "pipeline stages are consumed by advancing: call .clean() to continue"]
#[derive(Debug, Clone)]
pub struct Pending {
    index: usize,
    score: f32,
    raw: RawMask,
}

impl Pending {
    /// Wrap the engine's `index`-th proposal.
    pub fn new(index: usize, proposal: Proposal) -> Self {
        Self {
            index,
            score: proposal.score,
            raw: proposal.mask,
        }
    }

    /// Position in the engine's output order.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The unprocessed binary mask.
    #[must_use]
    pub const fn raw(&self) -> &RawMask {
        &self.raw
    }

    /// Remove specks and fill pinholes with a disk of `radius` pixels.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyImage`] if the mask has zero area.
    pub fn clean(self, radius: u32) -> Result<Cleaned, PipelineError> {
        let cleaned = crate::morphology::clean(&self.raw, radius)?;
        Ok(Cleaned {
            index: self.index,
            score: self.score,
            cleaned,
        })
    }
}

// ───────────────────────── Stage 1: Cleaned ──────────────────────────

/// A candidate after morphological cleaning.
///
/// Call [`feather`](Self::feather) to advance.
#[must_use = "pipeline stages are consumed by advancing: call .feather() to continue"]
#[derive(Debug, Clone)]
pub struct Cleaned {
    index: usize,
    score: f32,
    cleaned: CleanedMask,
}

impl Cleaned {
    /// The cleaned binary mask.
    #[must_use]
    pub const fn cleaned(&self) -> &CleanedMask {
        &self.cleaned
    }

    /// Turn the hard boundary into a soft alpha ramp.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` is invalid.
    pub fn feather(self, config: &FeatherConfig) -> Result<Feathered, PipelineError> {
        let alpha = crate::feather::feather(&self.cleaned, config)?;
        Ok(Feathered {
            index: self.index,
            score: self.score,
            alpha,
        })
    }
}

// ───────────────────────── Stage 2: Feathered ────────────────────────

/// A candidate with a continuous alpha mask.
///
/// Call [`composite`](Self::composite) to advance.
#[must_use = "pipeline stages are consumed by advancing: call .composite() to continue"]
#[derive(Debug, Clone)]
pub struct Feathered {
    index: usize,
    score: f32,
    alpha: AlphaMask,
}

impl Feathered {
    /// The feathered alpha mask.
    #[must_use]
    pub const fn alpha(&self) -> &AlphaMask {
        &self.alpha
    }

    /// Blend `source` against `background` through the alpha mask.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SizeMismatch`] if `source` and the mask
    /// differ in size.
    pub fn composite(
        self,
        source: &RgbaImage,
        background: Background,
    ) -> Result<Composited, PipelineError> {
        let composited = crate::composite::composite(source, &self.alpha, background)?;
        let bounds = bounding_box(&self.alpha);
        Ok(Composited {
            index: self.index,
            score: self.score,
            alpha: self.alpha,
            composited,
            bounds,
        })
    }
}

// ───────────────────────── Stage 3: Composited ───────────────────────

/// A candidate with its composited preview.
///
/// Call [`encode`](Self::encode) to finish.
#[must_use = "pipeline stages are consumed by advancing: call .encode() to continue"]
#[derive(Debug, Clone)]
pub struct Composited {
    index: usize,
    score: f32,
    alpha: AlphaMask,
    composited: RgbaImage,
    bounds: Option<BoundingBox>,
}

impl Composited {
    /// The composited preview.
    #[must_use]
    pub const fn composited(&self) -> &RgbaImage {
        &self.composited
    }

    /// The alpha mask the preview was blended with.
    #[must_use]
    pub const fn alpha(&self) -> &AlphaMask {
        &self.alpha
    }

    /// Bounds of the non-zero alpha region.
    #[must_use]
    pub const fn bounds(&self) -> Option<BoundingBox> {
        self.bounds
    }

    /// Encode the preview and the 8-bit alpha mask as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageEncode`] if PNG encoding fails.
    pub fn encode(self) -> Result<MaskResult, PipelineError> {
        let alpha_mask = self.alpha.to_gray_image();
        let composited_png = crate::codec::encode_rgba_png(&self.composited)?;
        let alpha_mask_png = crate::codec::encode_gray_png(&alpha_mask)?;
        Ok(MaskResult {
            score: self.score,
            index: self.index,
            composited: self.composited,
            alpha_mask,
            composited_png,
            alpha_mask_png,
            bounds: self.bounds,
        })
    }
}

// ───────────────────────── Orchestrator ──────────────────────────────

/// Process every proposal and return the results ranked by descending
/// score.
///
/// An empty `proposals` list yields an empty result list.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid,
/// [`PipelineError::EmptyImage`] if `source` has zero area,
/// [`PipelineError::DimensionMismatch`] or
/// [`PipelineError::InvalidScore`] naming the lowest offending index, or
/// [`PipelineError::ImageEncode`] if PNG encoding fails. No partial
/// results are returned.
pub fn run(
    source: &RgbaImage,
    proposals: Vec<Proposal>,
    config: &PipelineConfig,
) -> Result<Vec<MaskResult>, PipelineError> {
    run_with_diagnostics(source, proposals, config, &NoClock).map(|(results, _)| results)
}

/// Like [`run`], additionally timing every stage of every mask with
/// `clock`.
///
/// # Errors
///
/// Same as [`run`].
pub fn run_with_diagnostics<C>(
    source: &RgbaImage,
    proposals: Vec<Proposal>,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(Vec<MaskResult>, RunDiagnostics), PipelineError>
where
    C: Clock + Sync,
{
    let start = clock.now();
    config.validate()?;

    let dimensions = Dimensions::of(source);
    let summary = RunSummary {
        image_width: dimensions.width,
        image_height: dimensions.height,
        pixel_count: u64::from(dimensions.width) * u64::from(dimensions.height),
        mask_count: proposals.len(),
        best_score: proposals.iter().map(|p| p.score).reduce(f32::max),
    };

    if proposals.is_empty() {
        tracing::info!(%dimensions, "no candidate masks to process");
        let diagnostics = RunDiagnostics {
            masks: Vec::new(),
            total_duration: clock.elapsed(&start),
            summary,
        };
        return Ok((Vec::new(), diagnostics));
    }
    if dimensions.is_empty() {
        return Err(PipelineError::EmptyImage);
    }
    check_proposals(dimensions, &proposals)?;

    tracing::info!(
        %dimensions,
        masks = proposals.len(),
        clean_radius = config.clean_radius,
        method = %config.feather.method,
        width = config.feather.width,
        "processing candidate masks",
    );

    let processed: Vec<(MaskResult, MaskDiagnostics)> = proposals
        .into_par_iter()
        .enumerate()
        .map(|(index, proposal)| process_one(index, proposal, source, config, clock))
        .collect::<Result<_, _>>()?;

    let (mut results, masks): (Vec<_>, Vec<_>) = processed.into_iter().unzip();
    rank(&mut results);

    let diagnostics = RunDiagnostics {
        masks,
        total_duration: clock.elapsed(&start),
        summary,
    };
    tracing::debug!(
        total_ms = diagnostics.total_duration.as_secs_f64() * 1000.0,
        "mask processing complete",
    );
    Ok((results, diagnostics))
}

/// Sort results by descending score.
///
/// The sort is stable: equal scores keep their relative order, and
/// `-0.0` ties with `0.0`.
pub fn rank(results: &mut [MaskResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Fail on the lowest-indexed proposal whose size or score is unusable.
fn check_proposals(expected: Dimensions, proposals: &[Proposal]) -> Result<(), PipelineError> {
    for (index, proposal) in proposals.iter().enumerate() {
        let actual = proposal.mask.dimensions();
        if actual != expected {
            return Err(PipelineError::DimensionMismatch {
                index,
                expected,
                actual,
            });
        }
        if !proposal.score.is_finite() {
            return Err(PipelineError::InvalidScore {
                index,
                score: proposal.score,
            });
        }
    }
    Ok(())
}

fn process_one<C: Clock>(
    index: usize,
    proposal: Proposal,
    source: &RgbaImage,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(MaskResult, MaskDiagnostics), PipelineError> {
    let _span = tracing::debug_span!("mask", index).entered();
    let score = proposal.score;
    let foreground_before = proposal.mask.count_foreground();

    let t = clock.now();
    let cleaned = Pending::new(index, proposal).clean(config.clean_radius)?;
    let clean = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Clean {
            radius: config.clean_radius,
            foreground_before,
            foreground_after: cleaned.cleaned().count_foreground(),
        },
    };

    let t = clock.now();
    let feathered = cleaned.feather(&config.feather)?;
    let feather = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Feather {
            method: config.feather.method,
            width: config.feather.width,
            band_pixel_count: feathered.alpha().band_pixel_count(),
        },
    };

    let t = clock.now();
    let composited = feathered.composite(source, config.background)?;
    let composite = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Composite {
            covered_pixel_count: composited
                .alpha()
                .values()
                .iter()
                .filter(|&&a| a > 0.0)
                .count(),
            bounds: composited.bounds(),
        },
    };

    let t = clock.now();
    let result = composited.encode()?;
    let encode = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Encode {
            composited_bytes: result.composited_png.len(),
            alpha_mask_bytes: result.alpha_mask_png.len(),
        },
    };

    tracing::debug!(
        score,
        foreground_before,
        covered = ?result.bounds,
        "mask processed",
    );

    let diagnostics = MaskDiagnostics {
        index,
        score,
        clean,
        feather,
        composite,
        encode,
    };
    Ok((result, diagnostics))
}
