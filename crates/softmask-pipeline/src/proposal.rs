//! The seam to the upstream point-prompted mask proposal engine.
//!
//! The engine itself (a pretrained segmentation network) lives outside
//! this crate. It is consumed through the [`MaskProposer`] trait: given
//! an image and an ordered list of labelled point prompts it returns a
//! small, fixed number of candidate [`Proposal`]s.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PipelineError, Proposal, RgbaImage};

/// Whether a clicked point marks the object or its surroundings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PointLabel {
    /// Exclude the region around this point.
    Background = 0,
    /// Include the region around this point.
    Foreground = 1,
}

impl TryFrom<u8> for PointLabel {
    type Error = PipelineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Background),
            1 => Ok(Self::Foreground),
            other => Err(PipelineError::InvalidPrompt(format!(
                "label must be 0 (background) or 1 (foreground), got {other}"
            ))),
        }
    }
}

impl From<PointLabel> for u8 {
    fn from(label: PointLabel) -> Self {
        label as Self
    }
}

/// A labelled pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointPrompt {
    /// Column, pixels from the left edge.
    pub x: u32,
    /// Row, pixels from the top edge.
    pub y: u32,
    /// Foreground or background.
    pub label: PointLabel,
}

impl PointPrompt {
    /// Create a new prompt.
    #[must_use]
    pub const fn new(x: u32, y: u32, label: PointLabel) -> Self {
        Self { x, y, label }
    }
}

/// Zip parallel point and label lists into prompts.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidPrompt`] if the lists differ in length
/// or a label is not 0 or 1.
pub fn prompts_from_parts(
    points: &[(u32, u32)],
    labels: &[u8],
) -> Result<Vec<PointPrompt>, PipelineError> {
    if points.len() != labels.len() {
        return Err(PipelineError::InvalidPrompt(format!(
            "{} points but {} labels",
            points.len(),
            labels.len(),
        )));
    }
    points
        .iter()
        .zip(labels)
        .map(|(&(x, y), &label)| Ok(PointPrompt::new(x, y, PointLabel::try_from(label)?)))
        .collect()
}

/// Check that there is at least one prompt and every prompt lies inside
/// the image.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidPrompt`] naming the first offending
/// prompt.
pub fn validate_prompts(
    dimensions: Dimensions,
    prompts: &[PointPrompt],
) -> Result<(), PipelineError> {
    if prompts.is_empty() {
        return Err(PipelineError::InvalidPrompt(
            "at least one point prompt is required".into(),
        ));
    }
    if let Some((i, p)) = prompts
        .iter()
        .enumerate()
        .find(|(_, p)| p.x >= dimensions.width || p.y >= dimensions.height)
    {
        return Err(PipelineError::InvalidPrompt(format!(
            "prompt {i} at ({}, {}) lies outside the {dimensions} image",
            p.x, p.y,
        )));
    }
    Ok(())
}

/// A point-prompted segmentation engine.
///
/// Implementations return candidate masks matching the image's
/// dimensions, each with a confidence score in `[0, 1]`, in whatever
/// order the engine produces them. Closures with the same signature
/// implement this trait, which is convenient for tests and adapters.
pub trait MaskProposer {
    /// Propose candidate masks for `image` given ordered `prompts`.
    ///
    /// # Errors
    ///
    /// Engine failures should be reported as [`PipelineError::Proposal`].
    fn propose(
        &self,
        image: &RgbaImage,
        prompts: &[PointPrompt],
    ) -> Result<Vec<Proposal>, PipelineError>;
}

impl<F> MaskProposer for F
where
    F: Fn(&RgbaImage, &[PointPrompt]) -> Result<Vec<Proposal>, PipelineError>,
{
    fn propose(
        &self,
        image: &RgbaImage,
        prompts: &[PointPrompt],
    ) -> Result<Vec<Proposal>, PipelineError> {
        self(image, prompts)
    }
}
