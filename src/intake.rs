// src/intake.rs
//! Image intake: turns uploaded, dropped, pasted or on-disk images into data URLs.
//!
//! Non-image input is dropped without an error, matching how an upload widget
//! simply ignores a file of the wrong type.

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::GenerationError;

/// A base64 data URL (`data:<mime>;base64,<payload>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

/// Raw image bytes recovered from a data URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{};base64,{}", mime_type, BASE64_STANDARD.encode(bytes)))
    }

    /// Wrap an existing data URL string; the header is checked when decoded
    pub fn from_data_url(data_url: impl Into<String>) -> Self {
        Self(data_url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// MIME type from the header, if the header is well formed
    pub fn mime_type(&self) -> Option<&str> {
        let (header, _) = self.0.split_once(',')?;
        let header = header.strip_prefix("data:")?;
        header.split(';').next().filter(|m| !m.is_empty())
    }

    /// Split header from payload and base64-decode the payload
    pub fn decode(&self) -> Result<DecodedImage, GenerationError> {
        let (header, payload) = self
            .0
            .split_once(',')
            .ok_or_else(|| GenerationError::InvalidImage("missing ',' after data URL header".to_string()))?;

        let header = header
            .strip_prefix("data:")
            .ok_or_else(|| GenerationError::InvalidImage("missing 'data:' scheme".to_string()))?;

        let mut parts = header.split(';');
        let mime_type = parts.next().unwrap_or_default().to_string();
        if mime_type.is_empty() {
            return Err(GenerationError::InvalidImage("missing MIME type".to_string()));
        }
        if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
            return Err(GenerationError::InvalidImage("payload is not base64 encoded".to_string()));
        }

        let bytes = BASE64_STANDARD
            .decode(payload.trim())
            .map_err(|e| GenerationError::InvalidImage(format!("bad base64 payload: {}", e)))?;

        Ok(DecodedImage { mime_type, bytes })
    }
}

impl std::fmt::Display for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an image comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// A file on disk (CLI usage)
    File(PathBuf),
    /// Bytes from an upload, a drop or a clipboard paste
    Bytes {
        bytes: Vec<u8>,
        content_type: Option<String>,
        file_name: Option<String>,
    },
}

/// Read the source and encode it as a data URL.
///
/// Returns `Ok(None)` when the input is not an image. I/O failures (e.g. a missing
/// file) are still errors.
pub async fn read_as_data_url(source: ImageSource) -> std::io::Result<Option<EncodedImage>> {
    let (bytes, content_type, file_name) = match source {
        ImageSource::File(path) => {
            let bytes = tokio::fs::read(&path).await?;
            (bytes, None, Some(path.to_string_lossy().into_owned()))
        }
        ImageSource::Bytes { bytes, content_type, file_name } => (bytes, content_type, file_name),
    };

    if bytes.is_empty() {
        tracing::debug!("Ignoring empty image input");
        return Ok(None);
    }

    let mime_type = resolve_mime_type(content_type.as_deref(), file_name.as_deref(), &bytes);
    match mime_type {
        Some(mime) if mime.starts_with("image/") => {
            tracing::debug!("Encoded {} bytes of {} as data URL", bytes.len(), mime);
            Ok(Some(EncodedImage::from_bytes(&mime, &bytes)))
        }
        other => {
            tracing::debug!("Ignoring non-image input (detected type: {:?})", other);
            Ok(None)
        }
    }
}

/// Callback flavour of [`read_as_data_url`]: `on_encoded` runs once on success and
/// never for rejected input.
pub async fn intake<F>(source: ImageSource, on_encoded: F) -> std::io::Result<()>
where
    F: FnOnce(EncodedImage),
{
    if let Some(encoded) = read_as_data_url(source).await? {
        on_encoded(encoded);
    }
    Ok(())
}

fn resolve_mime_type(content_type: Option<&str>, file_name: Option<&str>, bytes: &[u8]) -> Option<String> {
    // Browsers send application/octet-stream for unknown types, treat it as undeclared
    let declared = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

    declared
        .or_else(|| file_name.and_then(mime_from_extension).map(str::to_string))
        .or_else(|| sniff_image_mime(bytes).map(str::to_string))
}

fn mime_from_extension(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())?;

    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "txt" => Some("text/plain"),
        "pdf" => Some("application/pdf"),
        "mp4" => Some("video/mp4"),
        _ => None,
    }
}

fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 12] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn bytes_source(bytes: &[u8], content_type: Option<&str>, file_name: Option<&str>) -> ImageSource {
        ImageSource::Bytes {
            bytes: bytes.to_vec(),
            content_type: content_type.map(str::to_string),
            file_name: file_name.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_declared_image_is_encoded() {
        let encoded = read_as_data_url(bytes_source(b"abc", Some("image/png"), None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(encoded.as_str(), "data:image/png;base64,YWJj");
        assert_eq!(encoded.mime_type(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_non_image_is_silently_rejected() {
        let result = read_as_data_url(bytes_source(b"hello", Some("text/plain"), Some("notes.txt")))
            .await
            .unwrap();
        assert!(result.is_none());

        let empty = read_as_data_url(bytes_source(b"", Some("image/png"), None)).await.unwrap();
        assert!(empty.is_none());
    }

    #[tokio::test]
    async fn test_octet_stream_falls_back_to_sniffing() {
        let encoded = read_as_data_url(bytes_source(&PNG_HEADER, Some("application/octet-stream"), None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(encoded.mime_type(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_extension_used_when_type_missing() {
        let encoded = read_as_data_url(bytes_source(b"jpegish", None, Some("Face.JPG")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(encoded.mime_type(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_callback_runs_once_on_success_and_never_on_rejection() {
        let mut calls = Vec::new();
        intake(bytes_source(&PNG_HEADER, None, None), |img| calls.push(img)).await.unwrap();
        intake(bytes_source(b"%PDF-1.7", None, Some("doc.pdf")), |img| calls.push(img))
            .await
            .unwrap();
        assert_eq!(calls.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = read_as_data_url(ImageSource::File(PathBuf::from("/definitely/not/here.png"))).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_round_trips_payload() {
        let encoded = EncodedImage::from_bytes("image/webp", &[1, 2, 3, 250]);
        let decoded = encoded.decode().unwrap();
        assert_eq!(decoded.mime_type, "image/webp");
        assert_eq!(decoded.bytes, vec![1, 2, 3, 250]);
    }

    #[test]
    fn test_decode_rejects_malformed_urls() {
        for bad in ["no-comma-here", "http://x.png,AAAA", "data:;base64,AAAA", "data:image/png,AAAA", "data:image/png;base64,@@@"] {
            let err = EncodedImage::from_data_url(bad).decode().unwrap_err();
            assert!(matches!(err, GenerationError::InvalidImage(_)), "{} should be rejected", bad);
        }
    }
}
