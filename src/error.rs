//! Unified error type for gemini-draw.

use thiserror::Error;

/// Errors that can occur while acquiring images or talking to upstream APIs.
#[derive(Debug, Error)]
pub enum DrawError {
    /// An API returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message or body preview from the API.
        message: String,
    },

    /// A network error occurred.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A request did not complete within its time budget.
    #[error("Request timed out after {seconds}s")]
    Timeout {
        /// The timeout that elapsed, in seconds.
        seconds: u64,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Image decode, resize or encode failure.
    #[error("Image conversion error: {0}")]
    ImageConversion(String),

    /// No API key configured for the generation endpoint.
    #[error("Please configure an API key first (GEMINI_DRAW_API_KEY or generation.api_key)")]
    MissingApiKey,
}

impl From<image::ImageError> for DrawError {
    fn from(e: image::ImageError) -> Self {
        Self::ImageConversion(e.to_string())
    }
}
