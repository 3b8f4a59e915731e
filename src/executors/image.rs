//! Image payloads for vision requests.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::{RefinerError, RefinerResult};

/// An image encoded for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,

    /// Base64 payload (standard alphabet, padded).
    pub data: String,
}

impl ImageInput {
    /// Wraps an already encoded payload.
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Encodes raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(mime_type, STANDARD.encode(bytes))
    }

    /// Reads and encodes an image file, guessing the MIME type from its extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> RefinerResult<Self> {
        let path = path.as_ref();
        let mime_type = mime_from_extension(path).ok_or_else(|| {
            RefinerError::config(format!("Unsupported image type: {}", path.display()))
        })?;
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(mime_type, &bytes))
    }

    /// Parses a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> RefinerResult<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| RefinerError::other("Image data URL must start with 'data:'"))?;
        let (mime_type, data) = rest
            .split_once(";base64,")
            .ok_or_else(|| RefinerError::other("Image data URL must be base64 encoded"))?;
        Ok(Self::new(mime_type, data))
    }

    /// Renders the image as a data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decodes the payload back into bytes.
    pub fn decode(&self) -> RefinerResult<Vec<u8>> {
        STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| RefinerError::other(format!("Invalid base64 image payload: {}", e)))
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_roundtrip() {
        let image = ImageInput::from_bytes("image/png", b"\x89PNG");
        let url = image.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));

        let parsed = ImageInput::from_data_url(&url).unwrap();
        assert_eq!(parsed, image);
        assert_eq!(parsed.decode().unwrap(), b"\x89PNG");
    }

    #[test]
    fn test_invalid_data_url() {
        assert!(ImageInput::from_data_url("http://example.com/a.png").is_err());
        assert!(ImageInput::from_data_url("data:image/png,raw").is_err());
    }

    #[test]
    fn test_from_path_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("equation.JPG");
        std::fs::write(&path, b"jpeg bytes").unwrap();

        let image = ImageInput::from_path(&path).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.decode().unwrap(), b"jpeg bytes");
    }

    #[test]
    fn test_from_path_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"text").unwrap();
        assert!(ImageInput::from_path(&path).is_err());
    }
}
