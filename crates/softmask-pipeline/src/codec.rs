//! Image decoding and deterministic PNG encoding.
//!
//! Decoding accepts whatever the `image` crate can read (PNG, JPEG, BMP,
//! WebP). Encoding always produces PNG with fixed compression and filter
//! settings, so the same raster yields the same bytes on every run and
//! downstream base64/data-URI output is reproducible.

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};

use crate::types::{BinaryMask, GrayImage, PipelineError, RgbaImage};

/// Decode raw image bytes into RGBA.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let img = image::load_from_memory(bytes).map_err(PipelineError::ImageDecode)?;
    Ok(img.to_rgba8())
}

/// Decode a mask image and threshold its luminance at the midpoint.
///
/// # Errors
///
/// Same as [`decode_rgba`].
pub fn decode_mask(bytes: &[u8]) -> Result<BinaryMask, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let img = image::load_from_memory(bytes).map_err(PipelineError::ImageDecode)?;
    Ok(BinaryMask::from_luma(&img.to_luma8()))
}

/// Encode an RGBA image as PNG.
///
/// # Errors
///
/// Returns [`PipelineError::ImageEncode`] if the encoder rejects the image.
pub fn encode_rgba_png(image: &RgbaImage) -> Result<Vec<u8>, PipelineError> {
    encode_png(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgba8)
}

/// Encode a grayscale image as PNG.
///
/// # Errors
///
/// Returns [`PipelineError::ImageEncode`] if the encoder rejects the image.
pub fn encode_gray_png(image: &GrayImage) -> Result<Vec<u8>, PipelineError> {
    encode_png(image.as_raw(), image.width(), image.height(), ExtendedColorType::L8)
}

fn encode_png(
    raw: &[u8],
    width: u32,
    height: u32,
    color: ExtendedColorType,
) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut buf, CompressionType::Default, FilterType::Adaptive);
    encoder
        .write_image(raw, width, height, color)
        .map_err(PipelineError::ImageEncode)?;
    Ok(buf)
}
