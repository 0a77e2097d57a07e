//! Inline image payloads
//!
//! The capture collaborator hands over screenshots as data URLs
//! (`data:image/jpeg;base64,...`). [`InlinePayload`] decodes them into a
//! content type and raw bytes, and re-encodes them for thumbnail rendering.

use crate::error::KeyError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

const DATA_URL_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64,";
const IMAGE_TYPE: &str = "image/";

/// Image content type, stored as its MIME subtype (`jpeg`, `png`, ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentType(String);

impl ContentType {
    /// Create from a MIME subtype
    ///
    /// # Errors
    /// Returns `KeyError::MalformedPayload` if the subtype is empty or has
    /// characters outside `[A-Za-z0-9+.-]`. Case is kept as given.
    pub fn new(subtype: impl AsRef<str>) -> Result<Self, KeyError> {
        let subtype = subtype.as_ref();
        if subtype.is_empty() {
            return Err(KeyError::MalformedPayload("empty image subtype".to_string()));
        }
        if !subtype
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(KeyError::MalformedPayload(format!(
                "invalid image subtype: {subtype}"
            )));
        }
        Ok(Self(subtype.to_string()))
    }

    /// JPEG, the capture widget's screenshot format
    #[inline]
    #[must_use]
    pub fn jpeg() -> Self {
        Self("jpeg".to_string())
    }

    /// Infer the content type of an image file from its extension
    ///
    /// `jpg` (any case) maps back to `jpeg`; other extensions are taken as
    /// the subtype verbatim.
    ///
    /// # Errors
    /// Returns `KeyError::MalformedPayload` for an unusable extension.
    pub fn from_extension(extension: &str) -> Result<Self, KeyError> {
        if extension.eq_ignore_ascii_case("jpg") {
            return Ok(Self::jpeg());
        }
        Self::new(extension)
    }

    /// MIME subtype
    #[inline]
    #[must_use]
    pub fn subtype(&self) -> &str {
        &self.0
    }

    /// Full MIME type, e.g. `image/jpeg`
    #[inline]
    #[must_use]
    pub fn mime(&self) -> String {
        format!("{IMAGE_TYPE}{}", self.0)
    }

    /// File extension used in storage keys
    ///
    /// Exactly `jpeg` is normalized to `jpg`; every other subtype, including
    /// differently cased ones, is used verbatim.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &str {
        if self.0 == "jpeg" {
            "jpg"
        } else {
            &self.0
        }
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{IMAGE_TYPE}{}", self.0)
    }
}

impl TryFrom<String> for ContentType {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentType> for String {
    fn from(value: ContentType) -> Self {
        value.0
    }
}

/// A captured image: content type plus decoded bytes
#[derive(Clone, PartialEq, Eq)]
pub struct InlinePayload {
    content_type: ContentType,
    bytes: Vec<u8>,
}

impl InlinePayload {
    /// Create from raw bytes and a MIME subtype
    ///
    /// # Errors
    /// Returns `KeyError::MalformedPayload` if the subtype is invalid.
    pub fn new(subtype: impl AsRef<str>, bytes: Vec<u8>) -> Result<Self, KeyError> {
        Ok(Self {
            content_type: ContentType::new(subtype)?,
            bytes,
        })
    }

    /// Create from an already validated content type
    #[inline]
    #[must_use]
    pub fn with_content_type(content_type: ContentType, bytes: Vec<u8>) -> Self {
        Self {
            content_type,
            bytes,
        }
    }

    /// Decode a `data:image/<subtype>;base64,<data>` URL
    ///
    /// # Errors
    /// Returns `KeyError::MalformedPayload` if the scheme, the image type
    /// marker or the base64 body is invalid.
    pub fn parse(data_url: &str) -> Result<Self, KeyError> {
        let rest = data_url
            .strip_prefix(DATA_URL_SCHEME)
            .ok_or_else(|| KeyError::MalformedPayload("missing data: scheme".to_string()))?;

        let (mime, body) = rest
            .split_once(BASE64_MARKER)
            .ok_or_else(|| KeyError::MalformedPayload("missing ;base64, marker".to_string()))?;

        let subtype = mime.strip_prefix(IMAGE_TYPE).ok_or_else(|| {
            KeyError::MalformedPayload(format!("not an image content type: {mime}"))
        })?;

        let content_type = ContentType::new(subtype)?;
        let bytes = STANDARD
            .decode(body.trim())
            .map_err(|e| KeyError::MalformedPayload(format!("invalid base64 body: {e}")))?;

        Ok(Self {
            content_type,
            bytes,
        })
    }

    /// Re-encode as a data URL for inline rendering
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!(
            "{DATA_URL_SCHEME}{}{BASE64_MARKER}{}",
            self.content_type.mime(),
            STANDARD.encode(&self.bytes)
        )
    }

    /// Content type declared by the payload
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Decoded image bytes
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of decoded bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the payload carries no bytes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Split into content type and bytes
    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (ContentType, Vec<u8>) {
        (self.content_type, self.bytes)
    }
}

impl fmt::Debug for InlinePayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlinePayload")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_extension_is_jpg() {
        assert_eq!(ContentType::jpeg().extension(), "jpg");
        assert_eq!(ContentType::new("JPEG").unwrap().extension(), "jpg");
    }

    #[test]
    fn other_subtypes_are_verbatim() {
        assert_eq!(ContentType::new("png").unwrap().extension(), "png");
        assert_eq!(ContentType::new("webp").unwrap().extension(), "webp");
        assert_eq!(ContentType::new("svg+xml").unwrap().extension(), "svg+xml");
    }

    #[test]
    fn from_extension_maps_jpg_back() {
        assert_eq!(ContentType::from_extension("jpg").unwrap(), ContentType::jpeg());
        assert_eq!(ContentType::from_extension("JPG").unwrap(), ContentType::jpeg());
        assert_eq!(ContentType::from_extension("PNG").unwrap().subtype(), "PNG");
    }

    #[test]
    fn subtype_case_is_kept() {
        let upper = InlinePayload::parse("data:image/PNG;base64,AAEC").unwrap();
        assert_eq!(upper.content_type().subtype(), "PNG");
        assert_eq!(upper.content_type().extension(), "PNG");
        assert_eq!(upper.to_data_url(), "data:image/PNG;base64,AAEC");

        assert_eq!(ContentType::new("JPEG").unwrap().extension(), "JPEG");
    }

    #[test]
    fn content_type_rejects_garbage() {
        assert!(ContentType::new("").is_err());
        assert!(ContentType::new("jp eg").is_err());
        assert!(ContentType::new("png/x").is_err());
    }

    #[test]
    fn content_type_display_and_mime() {
        let ct = ContentType::new("png").unwrap();
        assert_eq!(ct.mime(), "image/png");
        assert_eq!(ct.to_string(), "image/png");
    }

    #[test]
    fn content_type_serde_uses_subtype() {
        let ct = ContentType::new("png").unwrap();
        assert_eq!(serde_json::to_string(&ct).unwrap(), "\"png\"");
        let back: ContentType = serde_json::from_str("\"jpeg\"").unwrap();
        assert_eq!(back, ContentType::jpeg());
        assert!(serde_json::from_str::<ContentType>("\"a b\"").is_err());
    }

    #[test]
    fn parse_data_url() {
        let payload = InlinePayload::parse("data:image/png;base64,AAEC").unwrap();
        assert_eq!(payload.content_type().subtype(), "png");
        assert_eq!(payload.bytes(), &[0, 1, 2]);
        assert_eq!(payload.len(), 3);
    }

    #[test]
    fn parse_rejects_missing_scheme() {
        let result = InlinePayload::parse("image/png;base64,AAEC");
        assert!(matches!(result, Err(KeyError::MalformedPayload(_))));
    }

    #[test]
    fn parse_rejects_non_image() {
        let result = InlinePayload::parse("data:text/plain;base64,AAEC");
        assert!(matches!(result, Err(KeyError::MalformedPayload(_))));
    }

    #[test]
    fn parse_rejects_missing_marker() {
        let result = InlinePayload::parse("data:image/png,AAEC");
        assert!(matches!(result, Err(KeyError::MalformedPayload(_))));
    }

    #[test]
    fn parse_rejects_bad_base64() {
        let result = InlinePayload::parse("data:image/png;base64,@@@");
        assert!(matches!(result, Err(KeyError::MalformedPayload(_))));
    }

    #[test]
    fn data_url_reencodes() {
        let url = "data:image/jpeg;base64,/9j/4AAQ";
        let payload = InlinePayload::parse(url).unwrap();
        assert_eq!(payload.to_data_url(), url);
    }

    #[test]
    fn debug_hides_bytes() {
        let payload = InlinePayload::new("png", vec![7; 1024]).unwrap();
        let rendered = format!("{payload:?}");
        assert!(rendered.contains("len: 1024"));
        assert!(!rendered.contains("7, 7"));
    }
}
