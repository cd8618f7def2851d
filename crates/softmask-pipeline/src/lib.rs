//! softmask-pipeline: Mask post-processing for point-prompted
//! segmentation (sans-IO).
//!
//! Turns the coarse binary masks produced by a segmentation engine into
//! presentation-ready cut-outs through:
//! morphological cleaning -> feathering -> compositing -> PNG encoding,
//! then ranks the candidates by engine score.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and byte slices and returns structured data. The engine is
//! reached through the [`MaskProposer`] trait; wire formats live in
//! `softmask-export`.

pub mod codec;
pub mod composite;
pub mod diagnostics;
pub mod distance;
pub mod feather;
pub mod morphology;
pub mod pipeline;
pub mod proposal;
pub mod types;

pub use composite::Background;
pub use diagnostics::{Clock, NoClock, RunDiagnostics};
pub use feather::{FeatherConfig, FeatherMethod};
pub use pipeline::{Cleaned, Composited, Feathered, Pending, run, run_with_diagnostics};
pub use proposal::{MaskProposer, PointLabel, PointPrompt};
pub use types::{
    AlphaMask, BinaryMask, BoundingBox, CleanedMask, Dimensions, GrayImage, MaskResult,
    PipelineConfig, PipelineError, Proposal, RawMask, RgbaImage,
};

/// Prompt the engine and post-process every mask it proposes.
///
/// # Steps
///
/// 1. Validate `config` and `prompts` against the image
/// 2. Ask `proposer` for candidate masks
/// 3. Clean, feather, composite and encode each candidate
/// 4. Rank by descending score
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] or
/// [`PipelineError::InvalidPrompt`] before the engine is called.
/// Propagates engine failures unchanged, and otherwise fails as
/// [`run`] does.
pub fn segment<P>(
    proposer: &P,
    image: &RgbaImage,
    prompts: &[PointPrompt],
    config: &PipelineConfig,
) -> Result<Vec<MaskResult>, PipelineError>
where
    P: MaskProposer + ?Sized,
{
    config.validate()?;
    proposal::validate_prompts(Dimensions::of(image), prompts)?;

    let proposals = {
        let _span = tracing::debug_span!("propose", prompts = prompts.len()).entered();
        proposer.propose(image, prompts)?
    };
    tracing::debug!(candidates = proposals.len(), "engine returned candidates");

    run(image, proposals, config)
}
