//! softmask-export: Pure transport serializers (sans-IO)
//!
//! Converts pipeline results into what a front end consumes: PNG data
//! URIs wrapped in a JSON response document, and the inverse parsing of
//! point prompts submitted alongside a request.

pub mod data_uri;
pub mod request;
pub mod response;

pub use data_uri::{PngDataUri, decode_png_data_uri, png_data_uri};
pub use request::parse_prompts;
pub use response::{ResponseDocument, ResponseEntry, ResponseOptions};

use softmask_pipeline::PipelineError;

/// Errors produced while building or parsing transport documents.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// A pipeline operation (cropping, PNG encoding) failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A string was not a base64 PNG data URI.
    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),

    /// JSON could not be parsed or produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
