//! The JSON response document returned to the front end.
//!
//! ```json
//! {"results": [{"masked_image": "data:image/png;base64,...",
//!               "mask": "data:image/png;base64,...",
//!               "score": 0.97}]}
//! ```
//!
//! `masked_image` is the composited preview, cropped to the bounds of the
//! mask unless [`ResponseOptions::crop_to_bounds`] is off; an empty mask
//! is never cropped. `mask` is the full-size 8-bit alpha mask. Entries
//! keep the ranking of the input slice.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use softmask_pipeline::composite::crop;
use softmask_pipeline::{BoundingBox, MaskResult, codec};

use crate::ExportError;
use crate::data_uri::PngDataUri;

/// How results are turned into response entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseOptions {
    /// Crop each preview to its mask's bounding box.
    pub crop_to_bounds: bool,
}

impl Default for ResponseOptions {
    fn default() -> Self {
        Self {
            crop_to_bounds: true,
        }
    }
}

/// One ranked candidate.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntry {
    /// PNG of the composited preview.
    #[serde_as(as = "PngDataUri")]
    pub masked_image: Vec<u8>,
    /// PNG of the full-size alpha mask.
    #[serde_as(as = "PngDataUri")]
    pub mask: Vec<u8>,
    /// Engine confidence.
    pub score: f32,
    /// Region the preview was cropped to, in source pixel coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundingBox>,
}

/// The complete response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDocument {
    /// Candidates, best first.
    pub results: Vec<ResponseEntry>,
}

impl ResponseDocument {
    /// Build the document from ranked pipeline results.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Pipeline`] if re-encoding a cropped preview
    /// fails.
    pub fn from_results(
        results: &[MaskResult],
        options: ResponseOptions,
    ) -> Result<Self, ExportError> {
        let results = results
            .iter()
            .map(|result| entry(result, options))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(entries = results.len(), "built response document");
        Ok(Self { results })
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Json`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a document previously produced by [`to_json`](Self::to_json).
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Json`] for malformed JSON or data URIs.
    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn entry(result: &MaskResult, options: ResponseOptions) -> Result<ResponseEntry, ExportError> {
    let (masked_image, bounds) = match result.bounds {
        Some(bounds) if options.crop_to_bounds && !covers(result, bounds) => {
            let cropped = crop(&result.composited, bounds);
            (codec::encode_rgba_png(&cropped)?, Some(bounds))
        }
        _ => (result.composited_png.clone(), None),
    };
    Ok(ResponseEntry {
        masked_image,
        mask: result.alpha_mask_png.clone(),
        score: result.score,
        bounds,
    })
}

/// Whether `bounds` spans the whole preview, making a crop a no-op.
fn covers(result: &MaskResult, bounds: BoundingBox) -> bool {
    let (width, height) = result.composited.dimensions();
    bounds.x_min == 0 && bounds.y_min == 0 && bounds.x_max >= width && bounds.y_max >= height
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use softmask_pipeline::{BinaryMask, PipelineConfig, Proposal, RgbaImage, run};

    use super::*;

    fn results() -> Vec<MaskResult> {
        let source = RgbaImage::from_pixel(40, 30, image::Rgba([50, 60, 70, 255]));
        let near = BinaryMask::from_fn(40, 30, |x, y| (10..20).contains(&x) && (8..18).contains(&y));
        let empty = BinaryMask::from_fn(40, 30, |_, _| false);
        run(
            &source,
            vec![Proposal::new(empty, 0.2), Proposal::new(near, 0.9)],
            &PipelineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn previews_are_cropped_to_bounds() {
        let results = results();
        let doc = ResponseDocument::from_results(&results, ResponseOptions::default()).unwrap();
        let best = &doc.results[0];
        let bounds = best.bounds.unwrap();
        assert_eq!(bounds, results[0].bounds.unwrap());

        let preview = image::load_from_memory(&best.masked_image).unwrap();
        assert_eq!(preview.width(), bounds.width());
        assert_eq!(preview.height(), bounds.height());

        let mask = image::load_from_memory(&best.mask).unwrap();
        assert_eq!((mask.width(), mask.height()), (40, 30));
    }

    #[test]
    fn empty_masks_keep_the_full_preview() {
        let results = results();
        let doc = ResponseDocument::from_results(&results, ResponseOptions::default()).unwrap();
        let empty = &doc.results[1];
        assert!(empty.bounds.is_none());
        assert_eq!(empty.masked_image, results[1].composited_png);
    }

    #[test]
    fn cropping_can_be_disabled() {
        let results = results();
        let options = ResponseOptions {
            crop_to_bounds: false,
        };
        let doc = ResponseDocument::from_results(&results, options).unwrap();
        assert_eq!(doc.results[0].masked_image, results[0].composited_png);
    }

    #[test]
    fn json_shape_matches_the_wire_format() {
        let doc = ResponseDocument::from_results(&results(), ResponseOptions::default()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        let first = &json["results"][0];
        assert!(
            first["masked_image"]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,")
        );
        assert!(first["mask"].as_str().unwrap().starts_with("data:image/png;base64,"));
        assert!((first["score"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert!(json["results"][1].get("bounds").is_none());

        let parsed = ResponseDocument::from_json(&doc.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed, doc);
    }
}
