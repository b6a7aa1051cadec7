//! AI client error types.

use thiserror::Error;

pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Prediction failed: {0}")]
    PredictionFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AiError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Rate limits, server errors, timeouts and interrupted connections are
    /// transient; anything else is classified by its message text.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Api { status, .. } if *status == 429 || *status >= 500 => true,
            AiError::Timeout(_) => true,
            AiError::Network(e) if e.is_timeout() || e.is_connect() => true,
            AiError::MissingConfig(_) | AiError::Json(_) => false,
            other => is_retryable_message(&other.to_string()),
        }
    }
}

/// Classify an error message as transient (interruption, timeout, rate limit).
pub fn is_retryable_message(message: &str) -> bool {
    const MARKERS: &[&str] = &[
        "interrupted",
        "connection reset",
        "econnreset",
        "broken pipe",
        "timeout",
        "timed out",
        "rate limit",
        "rate-limit",
        "too many requests",
        "429",
    ];

    let lower = message.to_lowercase();
    MARKERS.iter().any(|m| lower.contains(m))
}
