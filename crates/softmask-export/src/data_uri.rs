//! `data:image/png;base64,...` URIs.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serializer};
use serde_with::{DeserializeAs, SerializeAs};

use crate::ExportError;

/// Prefix of every PNG data URI this crate produces.
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Wrap PNG bytes in a data URI.
#[must_use]
pub fn png_data_uri(png: &[u8]) -> String {
    let mut uri = String::with_capacity(PNG_DATA_URI_PREFIX.len() + png.len().div_ceil(3) * 4);
    uri.push_str(PNG_DATA_URI_PREFIX);
    STANDARD.encode_string(png, &mut uri);
    uri
}

/// Extract the PNG bytes from a data URI.
///
/// # Errors
///
/// Returns [`ExportError::InvalidDataUri`] if the prefix is missing or
/// the payload is not standard padded base64.
pub fn decode_png_data_uri(uri: &str) -> Result<Vec<u8>, ExportError> {
    let payload = uri
        .strip_prefix(PNG_DATA_URI_PREFIX)
        .ok_or_else(|| ExportError::InvalidDataUri("expected a base64 PNG data URI".into()))?;
    STANDARD
        .decode(payload)
        .map_err(|e| ExportError::InvalidDataUri(e.to_string()))
}

/// `serde_with` adapter that (de)serializes PNG bytes as a data URI.
///
/// ```rust
/// # use serde::Serialize;
/// # use serde_with::serde_as;
/// # use softmask_export::PngDataUri;
/// #[serde_as]
/// #[derive(Serialize)]
/// struct Preview {
///     #[serde_as(as = "PngDataUri")]
///     image: Vec<u8>,
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PngDataUri;

impl SerializeAs<Vec<u8>> for PngDataUri {
    fn serialize_as<S: Serializer>(source: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&png_data_uri(source))
    }
}

impl<'de> DeserializeAs<'de, Vec<u8>> for PngDataUri {
    fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let uri = String::deserialize(deserializer)?;
        decode_png_data_uri(&uri).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn uri_has_png_prefix() {
        let uri = png_data_uri(b"\x89PNG");
        assert_eq!(uri, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn decode_inverts_encode() {
        let bytes: Vec<u8> = (0..=255).collect();
        assert_eq!(decode_png_data_uri(&png_data_uri(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn foreign_uris_are_rejected() {
        assert!(matches!(
            decode_png_data_uri("data:image/jpeg;base64,AAAA"),
            Err(ExportError::InvalidDataUri(_))
        ));
        assert!(matches!(
            decode_png_data_uri("data:image/png;base64,***"),
            Err(ExportError::InvalidDataUri(_))
        ));
    }
}
