//! Alpha compositing of the source image against a background.
//!
//! Each output pixel is `alpha * source + (1 - alpha) * background`.
//!
//! For [`Background::Color`] the blend is applied to all four channels.
//! For [`Background::Transparent`] the blend happens in premultiplied
//! space and is stored straight: colour channels keep the source value
//! and only the alpha channel is scaled. Pixels with zero mask weight
//! are written as `[0, 0, 0, 0]` so a fully masked-out region is
//! byte-identical to the transparent background. Pixels with full mask
//! weight are copied unchanged, colour included.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::types::{AlphaMask, BoundingBox, Dimensions, PipelineError, alpha_to_u8};

/// What masked-out pixels are blended towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Background {
    /// Fully transparent: the preview is a cut-out.
    #[default]
    Transparent,
    /// A fixed straight-alpha RGBA colour.
    Color([u8; 4]),
}

impl Background {
    /// Parse `transparent` or a `#rrggbb` / `#rrggbbaa` hex colour.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for anything else.
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("transparent") {
            return Ok(Self::Transparent);
        }
        let invalid = || PipelineError::InvalidConfig(format!("invalid background colour: {s:?}"));
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(invalid());
        }
        let mut rgba = [0, 0, 0, 255];
        for (i, channel) in rgba.iter_mut().enumerate().take(hex.len() / 2) {
            *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self::Color(rgba))
    }
}

/// Blend `source` against `background` using `alpha` as the weight.
///
/// # Errors
///
/// Returns [`PipelineError::SizeMismatch`] if `alpha` and `source`
/// differ in size.
pub fn composite(
    source: &RgbaImage,
    alpha: &AlphaMask,
    background: Background,
) -> Result<RgbaImage, PipelineError> {
    let expected = Dimensions::of(source);
    if alpha.dimensions() != expected {
        return Err(PipelineError::SizeMismatch {
            expected,
            actual: alpha.dimensions(),
        });
    }

    Ok(RgbaImage::from_fn(expected.width, expected.height, |x, y| {
        let a = alpha.get(x, y);
        let src = source.get_pixel(x, y);
        match background {
            Background::Transparent if a <= 0.0 => Rgba([0, 0, 0, 0]),
            Background::Transparent if a >= 1.0 => *src,
            Background::Transparent => {
                let out_alpha = alpha_to_u8(a * f32::from(src[3]) / 255.0);
                Rgba([src[0], src[1], src[2], out_alpha])
            }
            Background::Color(bg) => Rgba(std::array::from_fn(|c| blend(src[c], bg[c], a))),
        }
    }))
}

/// `alpha * s + (1 - alpha) * b`, rounded to the nearest 8-bit value.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend(s: u8, b: u8, alpha: f32) -> u8 {
    let val = f32::from(s).mul_add(alpha, f32::from(b) * (1.0 - alpha));
    val.round().clamp(0.0, 255.0) as u8
}

/// Tight bounds of all pixels with non-zero alpha, or `None` if the mask
/// is empty.
#[must_use]
pub fn bounding_box(alpha: &AlphaMask) -> Option<BoundingBox> {
    let Dimensions { width, height } = alpha.dimensions();
    let mut bounds: Option<BoundingBox> = None;
    for y in 0..height {
        for x in 0..width {
            if alpha.get(x, y) <= 0.0 {
                continue;
            }
            let b = bounds.get_or_insert(BoundingBox {
                x_min: x,
                y_min: y,
                x_max: x + 1,
                y_max: y + 1,
            });
            b.x_min = b.x_min.min(x);
            b.y_min = b.y_min.min(y);
            b.x_max = b.x_max.max(x + 1);
            b.y_max = b.y_max.max(y + 1);
        }
    }
    bounds
}

/// Crop an image to `bounds`.
///
/// Bounds extending past the image are clipped to it.
#[must_use = "returns the cropped image"]
pub fn crop(image: &RgbaImage, bounds: BoundingBox) -> RgbaImage {
    let x = bounds.x_min.min(image.width());
    let y = bounds.y_min.min(image.height());
    let width = bounds.x_max.min(image.width()).saturating_sub(x);
    let height = bounds.y_max.min(image.height()).saturating_sub(y);
    image::imageops::crop_imm(image, x, y, width, height).to_image()
}
