//! Morphological noise removal: open then close with a disk.
//!
//! The structuring element is the Euclidean disk
//! `{(dx, dy) : dx² + dy² <= r²}`, which is symmetric under reflection.
//! Dilation and erosion are expressed through exact distance transforms
//! restricted to the image domain, so they form an adjunction and the
//! derived opening and closing are true algebraic filters. In particular
//! `close(open(m))` is idempotent, which is what makes [`clean`] safe to
//! apply repeatedly.
//!
//! Pixels beyond the image border belong to neither class: an object
//! touching the border is not eroded from outside the image.

use crate::distance::squared_distance_to;
use crate::types::{BinaryMask, CleanedMask, PipelineError, RawMask};

/// Grow the foreground by a disk of `radius` pixels.
#[must_use = "returns the dilated mask"]
pub fn dilate(mask: &BinaryMask, radius: u32) -> BinaryMask {
    let dimensions = mask.dimensions();
    let Some(field) = squared_distance_to(mask, true) else {
        return BinaryMask::filled(dimensions, false);
    };
    let limit = radius_squared(radius);
    let pixels = field.into_iter().map(|d| d <= limit).collect();
    BinaryMask::from_parts(dimensions, pixels)
}

/// Shrink the foreground by a disk of `radius` pixels.
#[must_use = "returns the eroded mask"]
pub fn erode(mask: &BinaryMask, radius: u32) -> BinaryMask {
    let dimensions = mask.dimensions();
    let Some(field) = squared_distance_to(mask, false) else {
        return BinaryMask::filled(dimensions, true);
    };
    let limit = radius_squared(radius);
    let pixels = field.into_iter().map(|d| d > limit).collect();
    BinaryMask::from_parts(dimensions, pixels)
}

/// Erosion followed by dilation: removes foreground specks and spurs
/// narrower than the disk.
#[must_use = "returns the opened mask"]
pub fn open(mask: &BinaryMask, radius: u32) -> BinaryMask {
    dilate(&erode(mask, radius), radius)
}

/// Dilation followed by erosion: fills background holes and notches
/// narrower than the disk.
#[must_use = "returns the closed mask"]
pub fn close(mask: &BinaryMask, radius: u32) -> BinaryMask {
    erode(&dilate(mask, radius), radius)
}

/// Remove small noise from a raw engine mask.
///
/// Applies [`open`] then [`close`] with a disk of `radius` pixels. A
/// radius of `0` returns the mask unchanged.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyImage`] if the mask has zero width or
/// height.
pub fn clean(mask: &RawMask, radius: u32) -> Result<CleanedMask, PipelineError> {
    if mask.dimensions().is_empty() {
        return Err(PipelineError::EmptyImage);
    }
    if radius == 0 {
        return Ok(mask.clone());
    }
    Ok(close(&open(mask, radius), radius))
}

fn radius_squared(radius: u32) -> f64 {
    let r = f64::from(radius);
    r * r
}
