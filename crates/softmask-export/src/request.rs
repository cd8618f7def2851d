//! Parsing of the point prompts a client submits with a request.
//!
//! Clients send two parallel JSON arrays: `points`, a list of
//! `{"x": .., "y": ..}` objects with numeric (possibly fractional)
//! coordinates, and `labels`, a list of `0`/`1` integers.

use serde::Deserialize;
use softmask_pipeline::proposal::prompts_from_parts;
use softmask_pipeline::{PipelineError, PointPrompt};

use crate::ExportError;

#[derive(Debug, Deserialize)]
struct ClickPoint {
    x: f64,
    y: f64,
}

/// Parse the `points` and `labels` JSON arrays into prompts.
///
/// Fractional coordinates are truncated towards zero. Bounds against
/// the image are not checked here; that happens when the prompts reach
/// the pipeline.
///
/// # Errors
///
/// Returns [`ExportError::Json`] for malformed JSON, and
/// [`PipelineError::InvalidPrompt`] (wrapped) for negative or
/// out-of-range coordinates, labels other than 0 or 1, or arrays of
/// different lengths.
pub fn parse_prompts(points_json: &str, labels_json: &str) -> Result<Vec<PointPrompt>, ExportError> {
    let points: Vec<ClickPoint> = serde_json::from_str(points_json)?;
    let labels: Vec<u8> = serde_json::from_str(labels_json)?;
    let coords = points
        .iter()
        .enumerate()
        .map(|(i, p)| Ok((to_pixel(i, p.x)?, to_pixel(i, p.y)?)))
        .collect::<Result<Vec<_>, PipelineError>>()?;
    Ok(prompts_from_parts(&coords, &labels)?)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_pixel(index: usize, value: f64) -> Result<u32, PipelineError> {
    let v = value.trunc();
    if !v.is_finite() || v < 0.0 || v > f64::from(u32::MAX) {
        return Err(PipelineError::InvalidPrompt(format!(
            "point {index} has coordinate {value} outside the pixel range",
        )));
    }
    Ok(v as u32)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use softmask_pipeline::PointLabel;

    use super::*;

    #[test]
    fn parses_parallel_arrays() {
        let prompts = parse_prompts(r#"[{"x": 10, "y": 20.7}, {"x": 3.2, "y": 0}]"#, "[1, 0]")
            .unwrap();
        assert_eq!(
            prompts,
            vec![
                PointPrompt::new(10, 20, PointLabel::Foreground),
                PointPrompt::new(3, 0, PointLabel::Background),
            ]
        );
    }

    #[test]
    fn rejects_bad_labels_and_lengths() {
        let err = parse_prompts(r#"[{"x": 1, "y": 1}]"#, "[2]").unwrap_err();
        assert!(matches!(err, ExportError::Pipeline(PipelineError::InvalidPrompt(_))));

        let err = parse_prompts(r#"[{"x": 1, "y": 1}]"#, "[1, 1]").unwrap_err();
        assert!(matches!(err, ExportError::Pipeline(PipelineError::InvalidPrompt(_))));
    }

    #[test]
    fn rejects_negative_coordinates() {
        let err = parse_prompts(r#"[{"x": -3, "y": 1}]"#, "[1]").unwrap_err();
        assert!(err.to_string().contains("point 0"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_prompts(r#"[{"x": 1}]"#, "[1]").unwrap_err();
        assert!(matches!(err, ExportError::Json(_)));
    }
}
