//! Shared types for the softmask post-processing pipeline.

use serde::{Deserialize, Serialize};

use crate::composite::Background;
use crate::feather::FeatherConfig;

/// Re-export `GrayImage` so downstream crates can reference rendered
/// alpha masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the source
/// and composited images without depending on `image` directly.
pub use image::RgbaImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of any `image` buffer.
    #[must_use]
    pub fn of<P, C>(image: &image::ImageBuffer<P, C>) -> Self
    where
        P: image::Pixel,
        C: std::ops::Deref<Target = [P::Subpixel]>,
    {
        Self::new(image.width(), image.height())
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A hard-edged foreground/background mask, stored row-major.
///
/// Produced by the upstream proposal engine ([`RawMask`]) and by the
/// morphological cleaner ([`CleanedMask`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    dimensions: Dimensions,
    pixels: Vec<bool>,
}

/// A mask exactly as the proposal engine returned it.
pub type RawMask = BinaryMask;

/// A mask after open-then-close noise removal.
pub type CleanedMask = BinaryMask;

impl BinaryMask {
    /// Wrap a row-major pixel vector.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidMask`] if `pixels.len()` does not
    /// equal `width * height`.
    pub fn new(dimensions: Dimensions, pixels: Vec<bool>) -> Result<Self, PipelineError> {
        if pixels.len() != dimensions.pixel_count() {
            return Err(PipelineError::InvalidMask(format!(
                "expected {} pixels for {dimensions}, got {}",
                dimensions.pixel_count(),
                pixels.len(),
            )));
        }
        Ok(Self { dimensions, pixels })
    }

    /// Build a mask by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let dimensions = Dimensions::new(width, height);
        let mut pixels = Vec::with_capacity(dimensions.pixel_count());
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self { dimensions, pixels }
    }

    /// Crate-internal constructor for buffers already sized to `dimensions`.
    pub(crate) fn from_parts(dimensions: Dimensions, pixels: Vec<bool>) -> Self {
        debug_assert_eq!(pixels.len(), dimensions.pixel_count());
        Self { dimensions, pixels }
    }

    /// A mask with every pixel set to `value`.
    #[must_use]
    pub fn filled(dimensions: Dimensions, value: bool) -> Self {
        Self {
            dimensions,
            pixels: vec![value; dimensions.pixel_count()],
        }
    }

    /// Threshold a grayscale image: values above 127 are foreground.
    #[must_use]
    pub fn from_luma(image: &GrayImage) -> Self {
        Self {
            dimensions: Dimensions::of(image),
            pixels: image.pixels().map(|p| p.0[0] > 127).collect(),
        }
    }

    /// Mask dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Row-major pixel values.
    #[must_use]
    pub fn pixels(&self) -> &[bool] {
        &self.pixels
    }

    /// Foreground state of the pixel at `(x, y)`.
    ///
    /// Out-of-range coordinates read as background.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.dimensions.width || y >= self.dimensions.height {
            return false;
        }
        self.pixels[y as usize * self.dimensions.width as usize + x as usize]
    }

    /// Number of foreground pixels.
    #[must_use]
    pub fn count_foreground(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }

    /// `Some(value)` if every pixel equals `value`, `None` if the mask
    /// contains both classes (or no pixels at all).
    #[must_use]
    pub fn uniform_value(&self) -> Option<bool> {
        let first = *self.pixels.first()?;
        self.pixels.iter().all(|&p| p == first).then_some(first)
    }
}

/// Per-pixel blend weights in `[0, 1]`, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMask {
    dimensions: Dimensions,
    values: Vec<f32>,
}

impl AlphaMask {
    /// Wrap a row-major weight vector, clamping each value into `[0, 1]`.
    ///
    /// NaN weights become `0.0`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidMask`] if `values.len()` does not
    /// equal `width * height`.
    pub fn new(dimensions: Dimensions, values: Vec<f32>) -> Result<Self, PipelineError> {
        if values.len() != dimensions.pixel_count() {
            return Err(PipelineError::InvalidMask(format!(
                "expected {} alpha values for {dimensions}, got {}",
                dimensions.pixel_count(),
                values.len(),
            )));
        }
        let values = values
            .into_iter()
            .map(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) })
            .collect();
        Ok(Self { dimensions, values })
    }

    /// Reinterpret a binary mask as alpha `{0.0, 1.0}`.
    #[must_use]
    pub fn from_binary(mask: &BinaryMask) -> Self {
        Self {
            dimensions: mask.dimensions(),
            values: mask
                .pixels()
                .iter()
                .map(|&p| if p { 1.0 } else { 0.0 })
                .collect(),
        }
    }

    /// Crate-internal constructor for values already known to be in range.
    pub(crate) const fn from_clamped(dimensions: Dimensions, values: Vec<f32>) -> Self {
        Self { dimensions, values }
    }

    /// Mask dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Row-major alpha values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Alpha at `(x, y)`; out-of-range coordinates read as `0.0`.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if x >= self.dimensions.width || y >= self.dimensions.height {
            return 0.0;
        }
        self.values[y as usize * self.dimensions.width as usize + x as usize]
    }

    /// Number of pixels strictly between fully transparent and fully opaque.
    #[must_use]
    pub fn band_pixel_count(&self) -> usize {
        self.values.iter().filter(|&&v| v > 0.0 && v < 1.0).count()
    }

    /// Render as an 8-bit grayscale image (`round(alpha * 255)`).
    #[must_use]
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.dimensions.width, self.dimensions.height, |x, y| {
            image::Luma([alpha_to_u8(self.get(x, y))])
        })
    }
}

/// Map an alpha weight to an 8-bit channel value.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn alpha_to_u8(alpha: f32) -> u8 {
    (alpha * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Axis-aligned pixel bounds; `x_max` and `y_max` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Leftmost covered column.
    pub x_min: u32,
    /// Topmost covered row.
    pub y_min: u32,
    /// One past the rightmost covered column.
    pub x_max: u32,
    /// One past the bottommost covered row.
    pub y_max: u32,
}

impl BoundingBox {
    /// Width of the box in pixels.
    #[must_use]
    pub const fn width(self) -> u32 {
        self.x_max - self.x_min
    }

    /// Height of the box in pixels.
    #[must_use]
    pub const fn height(self) -> u32 {
        self.y_max - self.y_min
    }
}

/// One candidate mask as returned by the upstream proposal engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    /// Hard mask, same dimensions as the source image.
    pub mask: RawMask,
    /// Engine confidence in `[0, 1]`.
    pub score: f32,
}

impl Proposal {
    /// Create a new proposal.
    #[must_use]
    pub const fn new(mask: RawMask, score: f32) -> Self {
        Self { mask, score }
    }
}

/// Configuration for the mask post-processing pipeline.
///
/// A single value is typically built once at startup and shared by
/// reference across requests; nothing in the pipeline mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Radius of the disk structuring element used by the open-then-close
    /// cleaner. `0` disables cleaning.
    pub clean_radius: u32,

    /// Feathering curve and band width.
    pub feather: FeatherConfig,

    /// What masked-out pixels are blended towards in the preview.
    pub background: Background,
}

impl PipelineConfig {
    /// Default structuring-element radius for noise removal.
    pub const DEFAULT_CLEAN_RADIUS: u32 = 4;

    /// Check every parameter before any pixel work starts.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the feather settings
    /// are invalid.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.feather.validate()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            clean_radius: Self::DEFAULT_CLEAN_RADIUS,
            feather: FeatherConfig::default(),
            background: Background::default(),
        }
    }
}

/// The processed output for one candidate mask.
///
/// Does not derive `PartialEq` because comparing full raster buffers is
/// rarely what callers want; compare `score` or the encoded bytes.
#[derive(Debug, Clone)]
pub struct MaskResult {
    /// Engine confidence carried through unchanged.
    pub score: f32,
    /// Position of this mask in the engine's original output order.
    pub index: usize,
    /// Source image blended against the background by the alpha mask.
    pub composited: RgbaImage,
    /// Grayscale rendering of the feathered alpha mask.
    pub alpha_mask: GrayImage,
    /// PNG encoding of [`composited`](Self::composited).
    pub composited_png: Vec<u8>,
    /// PNG encoding of [`alpha_mask`](Self::alpha_mask).
    pub alpha_mask_png: Vec<u8>,
    /// Bounds of the non-zero alpha region, `None` for an empty mask.
    pub bounds: Option<BoundingBox>,
}

/// Errors that can occur during mask post-processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// A feather method name did not match any known curve.
    #[error("unknown feather method: {0:?}")]
    UnknownFeatherMethod(String),

    /// A raw mask disagrees with the source image's dimensions.
    #[error("mask {index} is {actual}, expected {expected} to match the source image")]
    DimensionMismatch {
        /// Position of the offending mask in the engine's output order.
        index: usize,
        /// Source image dimensions.
        expected: Dimensions,
        /// Offending mask dimensions.
        actual: Dimensions,
    },

    /// Two rasters that must align have different dimensions.
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Dimensions of the reference raster.
        expected: Dimensions,
        /// Dimensions of the mismatched raster.
        actual: Dimensions,
    },

    /// A proposal score is NaN or infinite.
    #[error("mask {index} has non-finite score {score}")]
    InvalidScore {
        /// Position of the offending mask in the engine's output order.
        index: usize,
        /// The rejected score.
        score: f32,
    },

    /// A mask's pixel buffer does not fit its dimensions.
    #[error("invalid mask: {0}")]
    InvalidMask(String),

    /// An image or mask has zero width or height.
    #[error("image has zero width or height")]
    EmptyImage,

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Point prompts are malformed.
    #[error("invalid point prompt: {0}")]
    InvalidPrompt(String),

    /// The upstream proposal engine failed.
    #[error("mask proposal failed: {0}")]
    Proposal(String),

    /// Failed to decode an input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[source] image::ImageError),

    /// Failed to encode an output image.
    #[error("failed to encode image: {0}")]
    ImageEncode(#[source] image::ImageError),
}
