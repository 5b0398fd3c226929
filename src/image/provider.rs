//! Edit client trait.

use crate::error::Result;
use crate::image::types::EncodedPayload;
use async_trait::async_trait;

/// A service that applies a text instruction to an image.
///
/// Each `submit` performs exactly one remote call; there are no retries.
#[async_trait]
pub trait EditClient: Send + Sync {
    /// Sends the image and instruction, returning the first inline image's
    /// base64 data, or `None` when the service produced no image.
    ///
    /// Transport and service failures come back as
    /// [`EditError::ServiceCallFailed`](crate::EditError::ServiceCallFailed).
    async fn submit(&self, payload: &EncodedPayload, prompt: &str) -> Result<Option<String>>;

    /// Returns the name of this client for display.
    fn name(&self) -> &str;

    /// Checks if the service is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}

#[async_trait]
impl<T: EditClient + ?Sized> EditClient for std::sync::Arc<T> {
    async fn submit(&self, payload: &EncodedPayload, prompt: &str) -> Result<Option<String>> {
        (**self).submit(payload, prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn health_check(&self) -> Result<()> {
        (**self).health_check().await
    }
}
