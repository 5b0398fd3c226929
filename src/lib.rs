#![warn(missing_docs)]
//! genedit - edit photos with a text instruction via the Gemini image API.
//!
//! The crate has three layers:
//!
//! - [`image::encode`] turns a selected [`ImageSource`] into an inline
//!   base64 payload.
//! - [`EditClient`] sends one payload plus instruction and returns the first
//!   inline image of the response ([`GeminiClient`] talks to Gemini).
//! - [`WorkflowController`] holds the selection, prompt, loading flag and
//!   last outcome, and publishes every change to subscribers.
//!
//! # Quick Start
//!
//! ```no_run
//! use genedit::{GeminiClient, ImageFile, WorkflowController};
//!
//! #[tokio::main]
//! async fn main() -> genedit::Result<()> {
//!     let client = GeminiClient::builder().build()?;
//!     let controller = WorkflowController::new(client);
//!
//!     controller.select_image(ImageFile::new("portrait.jpg"));
//!     controller.set_prompt("add sunglasses");
//!
//!     let image = controller.generate().await?;
//!     image.save(genedit::image::DOWNLOAD_FILE_NAME)?;
//!     Ok(())
//! }
//! ```

mod error;
pub mod image;
pub mod workflow;

// Re-export error types at crate root
pub use error::{
    EditError, Result, EMPTY_RESULT_MESSAGE, MISSING_INPUT_MESSAGE, SERVICE_FAILURE_MESSAGE,
};

pub use image::providers::{GeminiClient, GeminiClientBuilder, GeminiModel};
pub use image::{
    EditClient, EditRequest, EditResult, EditedImage, EncodedPayload, ImageFile, ImageFormat,
    ImageSource, UploadedImage,
};
pub use workflow::{WorkflowController, WorkflowState};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{EditError, Result};
    pub use crate::image::providers::GeminiClient;
    pub use crate::image::{EditClient, EditedImage, ImageFile, ImageSource, UploadedImage};
    pub use crate::workflow::{WorkflowController, WorkflowState};
}
