//! Edit service clients.

mod gemini;

pub use gemini::{
    GeminiClient, GeminiClientBuilder, GeminiModel, API_KEY_ENV_VARS, DEFAULT_BASE_URL,
};
