//! Error types for the remote client and session handling.

use thiserror::Error;

/// Failure of one round-trip to the model.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Gemini API HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response blocked: {0}")]
    Blocked(String),

    #[error("response contained no text")]
    Empty,
}

/// Failure to obtain a usable chat session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("API key is empty")]
    MissingApiKey,

    #[error("API key contains characters that cannot be sent in a request header")]
    InvalidApiKey,

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// Construction already failed for the current key and prompt.
    #[error("no usable session for the current API key")]
    Unavailable,
}
