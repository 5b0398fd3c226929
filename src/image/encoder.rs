//! Turns a selected image into an inline payload.

use crate::error::{EditError, Result};
use crate::image::types::{EncodedPayload, ImageFile, UploadedImage};
use async_trait::async_trait;

/// Something the user selected as the image to edit.
#[async_trait]
pub trait ImageSource: Send + Sync + std::fmt::Debug {
    /// Name shown to the user.
    fn file_name(&self) -> &str;

    /// MIME type declared for the content.
    fn mime_type(&self) -> &str;

    /// Reads the full content.
    async fn read_bytes(&self) -> std::io::Result<Vec<u8>>;
}

#[async_trait]
impl ImageSource for UploadedImage {
    fn file_name(&self) -> &str {
        UploadedImage::file_name(self)
    }

    fn mime_type(&self) -> &str {
        UploadedImage::mime_type(self)
    }

    async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.bytes().to_vec())
    }
}

#[async_trait]
impl ImageSource for ImageFile {
    fn file_name(&self) -> &str {
        ImageFile::file_name(self)
    }

    fn mime_type(&self) -> &str {
        ImageFile::mime_type(self)
    }

    async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.path()).await
    }
}

/// Reads the source and encodes it as base64 alongside its MIME type.
pub async fn encode(source: &dyn ImageSource) -> Result<EncodedPayload> {
    let data = source
        .read_bytes()
        .await
        .map_err(|source_err| EditError::Read {
            file_name: source.file_name().to_string(),
            source: source_err,
        })?;

    tracing::debug!(
        file = source.file_name(),
        mime_type = source.mime_type(),
        bytes = data.len(),
        "encoded image"
    );

    Ok(EncodedPayload::from_bytes(&data, source.mime_type()))
}
