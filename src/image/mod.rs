//! Image selection, encoding and the edit service client.

pub mod encoder;
mod provider;
pub mod providers;
mod types;

pub use encoder::{encode, ImageSource};
pub use provider::EditClient;
pub use types::{
    EditRequest, EditResult, EditedImage, EncodedPayload, ImageFile, ImageFormat, UploadedImage,
    DOWNLOAD_FILE_NAME, DOWNLOAD_MIME_TYPE, UNKNOWN_MIME_TYPE,
};
