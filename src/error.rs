//! Error types for the edit workflow.

use std::time::Duration;

/// Message shown when generate is requested without an image or prompt.
pub const MISSING_INPUT_MESSAGE: &str = "Please upload an image and enter a prompt.";

/// Message shown when the service answered without any image data.
pub const EMPTY_RESULT_MESSAGE: &str =
    "Failed to generate image. The model did not return image data.";

/// Message carried by every service-level failure.
pub const SERVICE_FAILURE_MESSAGE: &str = "Failed to communicate with the Gemini API.";

/// Errors that can occur while editing an image.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// Missing image/prompt, or a payload that fails the client precondition.
    #[error("{0}")]
    Validation(String),

    /// The selected image could not be read.
    #[error("could not read {file_name}: {source}")]
    Read {
        /// Name of the file that failed.
        file_name: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Transport or service failure. The cause is logged, not carried.
    #[error("{0}")]
    ServiceCallFailed(String),

    /// The service responded without image data.
    #[error("{}", EMPTY_RESULT_MESSAGE)]
    EmptyResult,

    /// A generation is already in flight.
    #[error("a generation is already in progress")]
    Busy,

    /// A newer request replaced this one before it finished.
    #[error("request superseded by a newer one")]
    Superseded,

    /// Startup configuration is unusable (e.g. no API key).
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EditError {
    /// Wraps a low-level service failure into the opaque variant, logging the cause.
    pub(crate) fn service(cause: ServiceFailure) -> Self {
        tracing::error!(error = %cause, "error calling Gemini API");
        Self::ServiceCallFailed(SERVICE_FAILURE_MESSAGE.into())
    }

    /// Returns the message a user should see for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) if msg == MISSING_INPUT_MESSAGE => msg.clone(),
            Self::EmptyResult => EMPTY_RESULT_MESSAGE.into(),
            other => format!("An error occurred: {other}"),
        }
    }
}

/// Result type alias for edit operations.
pub type Result<T> = std::result::Result<T, EditError>;

/// Classified low-level failures of a service call.
///
/// These never leave the crate; they exist so the log line says what went wrong.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ServiceFailure {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Maximum length of an error body kept for logging.
const MAX_ERROR_BODY: usize = 500;

/// Redacts anything that looks like an API key and truncates long bodies.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            let token = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-' && c != '_');
            if token.starts_with("AIza") && token.len() >= 30 {
                word.replace(token, "[REDACTED]")
            } else {
                word.to_string()
            }
        })
        .collect();
    let joined = redacted.join(" ");

    if joined.chars().count() > MAX_ERROR_BODY {
        let truncated: String = joined.chars().take(MAX_ERROR_BODY).collect();
        format!("{truncated}...")
    } else {
        joined
    }
}

/// Reads a `Retry-After` header expressed in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
