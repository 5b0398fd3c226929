//! Core types for image editing.

use crate::error::{EditError, Result};
use base64::Engine;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// MIME type used when the extension is not a supported image type.
pub const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// MIME type the edited image is offered for download as.
pub const DOWNLOAD_MIME_TYPE: &str = "image/png";

/// Default file name for a downloaded edit.
pub const DOWNLOAD_FILE_NAME: &str = "generated-image.png";

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Formats accepted for upload.
    pub const ACCEPTED: [ImageFormat; 3] = [Self::Png, Self::Jpeg, Self::WebP];

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// An image held in memory after the user picked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    raw_bytes: Vec<u8>,
    mime_type: String,
    file_name: String,
}

impl UploadedImage {
    /// Creates an image from bytes and the MIME type declared for them.
    pub fn new(
        raw_bytes: Vec<u8>,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            raw_bytes,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    /// Reads a file from disk, taking the MIME type from its content or extension.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = ImageFile::new(path.as_ref());
        let raw_bytes = tokio::fs::read(path.as_ref())
            .await
            .map_err(|source| EditError::Read {
                file_name: file.file_name.clone(),
                source,
            })?;
        let mime_type = ImageFormat::from_magic_bytes(&raw_bytes)
            .map(|f| f.mime_type().to_string())
            .unwrap_or(file.mime_type);
        Ok(Self::new(raw_bytes, mime_type, file.file_name))
    }

    /// Raw image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    /// Declared MIME type.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Name shown to the user.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// An image on disk, read only when it is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    path: PathBuf,
    mime_type: String,
    file_name: String,
}

impl ImageFile {
    /// Selects a file; its MIME type comes from the extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
            .map(|f| f.mime_type())
            .unwrap_or(UNKNOWN_MIME_TYPE)
            .to_string();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            mime_type,
            file_name,
        }
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared MIME type.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Name shown to the user.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Base64 image data plus its MIME type, ready to embed in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    /// Standard padded base64 of the raw bytes.
    pub base64_data: String,
    /// MIME type of the encoded image.
    pub mime_type: String,
}

impl EncodedPayload {
    /// Encodes raw bytes.
    pub fn from_bytes(data: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            base64_data: base64::engine::general_purpose::STANDARD.encode(data),
            mime_type: mime_type.into(),
        }
    }

    /// Checks the payload is something the service can accept.
    pub fn validate(&self) -> Result<()> {
        if self.base64_data.is_empty() {
            return Err(EditError::Validation("image payload is empty".into()));
        }
        match self.mime_type.split_once('/') {
            Some(("image", subtype)) if !subtype.is_empty() => Ok(()),
            _ => Err(EditError::Validation(format!(
                "unsupported MIME type: {}",
                self.mime_type
            ))),
        }
    }
}

/// One edit instruction applied to one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    /// The encoded source image.
    pub payload: EncodedPayload,
    /// Natural-language description of the edit.
    pub prompt: String,
}

impl EditRequest {
    /// Creates a request, checking the payload and prompt.
    pub fn new(payload: EncodedPayload, prompt: impl Into<String>) -> Result<Self> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(EditError::Validation("prompt is empty".into()));
        }
        payload.validate()?;
        Ok(Self { payload, prompt })
    }
}

/// The image returned by a successful edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use = "edited image should be saved or displayed"]
pub struct EditedImage {
    /// Base64 image data exactly as the service returned it.
    pub base64_data: String,
}

/// Outcome of one edit.
pub type EditResult = Result<EditedImage>;

impl EditedImage {
    /// Wraps base64 data returned by the service.
    pub fn new(base64_data: impl Into<String>) -> Self {
        Self {
            base64_data: base64_data.into(),
        }
    }

    /// Returns the image as a PNG data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", DOWNLOAD_MIME_TYPE, self.base64_data)
    }

    /// Decodes the image bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_base64_lenient(&self.base64_data).map_err(|e| EditError::Decode(e.to_string()))
    }

    /// Saves the decoded image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.decode()?)?;
        Ok(())
    }
}

/// Decodes a base64 string that may be imperfectly formatted.
///
/// Accepts a data URI prefix, embedded whitespace and missing padding.
pub(crate) fn decode_base64_lenient(input: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let b64 = match input.find(";base64,") {
        Some(pos) => &input[pos + 8..],
        None => input,
    };

    let cleaned: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD.decode(&cleaned)
}
