use bytes::Bytes;
use serde::Serialize;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
pub const DEFAULT_EXTENSION: &str = "bin";

/// Downloaded media payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaAsset {
    #[serde(skip)]
    pub bytes: Bytes,
    pub mime_type: String,
    pub file_extension: String,
}

impl MediaAsset {
    /// Builds an asset, deriving the extension from the provider-reported mime type.
    ///
    /// ```
    /// use wamsg_core::MediaAsset;
    ///
    /// let asset = MediaAsset::new(vec![1u8, 2, 3], Some("image/jpeg"));
    /// assert_eq!(asset.file_extension, "jpeg");
    ///
    /// let unknown = MediaAsset::new(Vec::<u8>::new(), None);
    /// assert_eq!(unknown.file_extension, "bin");
    /// assert_eq!(unknown.mime_type, "application/octet-stream");
    /// ```
    pub fn new(bytes: impl Into<Bytes>, mime_type: Option<&str>) -> Self {
        let mime = mime_type
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE);
        Self {
            bytes: bytes.into(),
            mime_type: mime.to_string(),
            file_extension: extension_for_mime(mime_type),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Text after the last `/` of the mime type, ignoring parameters; `bin` otherwise.
pub fn extension_for_mime(mime_type: Option<&str>) -> String {
    let Some(mime) = mime_type else {
        return DEFAULT_EXTENSION.to_string();
    };
    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence.rsplit_once('/') {
        Some((kind, subtype)) if !kind.is_empty() && !subtype.trim().is_empty() => {
            subtype.trim().to_ascii_lowercase()
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_extension_from_subtype() {
        assert_eq!(extension_for_mime(Some("application/pdf")), "pdf");
        assert_eq!(extension_for_mime(Some("audio/ogg; codecs=opus")), "ogg");
        assert_eq!(extension_for_mime(Some("IMAGE/PNG")), "png");
    }

    #[test]
    fn falls_back_to_bin() {
        assert_eq!(extension_for_mime(None), "bin");
        assert_eq!(extension_for_mime(Some("")), "bin");
        assert_eq!(extension_for_mime(Some("octet")), "bin");
        assert_eq!(extension_for_mime(Some("image/")), "bin");
        assert_eq!(extension_for_mime(Some("/png")), "bin");
    }

    #[test]
    fn absent_mime_reports_octet_stream() {
        let asset = MediaAsset::new(Bytes::from_static(b"abc"), None);
        assert_eq!(asset.mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(asset.file_extension, "bin");
        assert_eq!(asset.len(), 3);
    }
}
