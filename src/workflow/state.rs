//! Observable workflow state.

use crate::image::EditedImage;
use serde::Serialize;

/// What a view of the edit workflow needs to render.
///
/// `is_loading` never coexists with `last_result` or `last_error`, and at
/// most one of `last_result` / `last_error` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowState {
    /// An image has been selected.
    pub has_image: bool,
    /// The prompt is non-empty.
    pub has_prompt: bool,
    /// A generation is in flight.
    pub is_loading: bool,
    /// User-facing message from the last failed step.
    pub last_error: Option<String>,
    /// Image produced by the last successful generation.
    pub last_result: Option<EditedImage>,
    /// Display name of the selected image.
    pub image_name: Option<String>,
    /// Number of outcomes published so far; advances even when an outcome
    /// repeats the previous one.
    pub outcomes: u64,
}

impl WorkflowState {
    /// Whether a generate request would be accepted right now.
    pub fn can_generate(&self) -> bool {
        self.has_image && self.has_prompt && !self.is_loading
    }

    pub(crate) fn start_loading(&mut self) {
        self.is_loading = true;
        self.last_error = None;
        self.last_result = None;
    }

    pub(crate) fn finish_with(&mut self, outcome: std::result::Result<EditedImage, String>) {
        self.is_loading = false;
        self.outcomes += 1;
        match outcome {
            Ok(image) => {
                self.last_result = Some(image);
                self.last_error = None;
            }
            Err(message) => {
                self.last_result = None;
                self.last_error = Some(message);
            }
        }
    }

    pub(crate) fn clear_outcome(&mut self) {
        self.last_error = None;
        self.last_result = None;
    }
}
