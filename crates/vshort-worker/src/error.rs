//! Worker error types.

use thiserror::Error;

use vshort_ai::is_retryable_message;
use vshort_media::{is_rate_limited, MediaError};

pub type WorkerResult<T> = Result<T, WorkerError>;

/// How a failure propagates through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient backend error; retry with backoff.
    RecoverableBackend,
    /// A lower-fidelity path produced a result; continue.
    DegradedQuality,
    /// The stage cannot succeed; substitute a placeholder and continue.
    UnrecoverableStage,
    /// No artifact of any quality is obtainable; abort the session.
    FatalIo,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("Degraded quality: {0}")]
    DegradedQuality(String),

    #[error("Stage {stage} failed: {message}")]
    StageFailed { stage: String, message: String },

    #[error("All strategies failed: {}", failures.join("; "))]
    AllStrategiesFailed { failures: Vec<String> },

    #[error("Fatal IO: {0}")]
    FatalIo(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("AI error: {0}")]
    Ai(#[from] vshort_ai::AiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn timeout(operation: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            secs,
        }
    }

    pub fn stage_failed(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::StageFailed {
            stage: stage.into(),
            message: msg.into(),
        }
    }

    pub fn fatal_io(msg: impl Into<String>) -> Self {
        Self::FatalIo(msg.into())
    }

    /// Position of this error in the propagation taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            WorkerError::RateLimited(_) | WorkerError::Timeout { .. } => {
                ErrorClass::RecoverableBackend
            }
            WorkerError::Backend(msg) if is_retryable_message(msg) => ErrorClass::RecoverableBackend,
            WorkerError::DegradedQuality(_) => ErrorClass::DegradedQuality,
            WorkerError::FatalIo(_) | WorkerError::Io(_) => ErrorClass::FatalIo,
            WorkerError::Media(e) => match e {
                MediaError::Timeout(_) => ErrorClass::RecoverableBackend,
                MediaError::DownloadFailed { message } if is_rate_limited(message) => {
                    ErrorClass::RecoverableBackend
                }
                MediaError::Http(e) if e.is_timeout() || e.is_connect() => {
                    ErrorClass::RecoverableBackend
                }
                MediaError::QualityTooLow { .. } => ErrorClass::DegradedQuality,
                e if e.is_missing_tool() => ErrorClass::FatalIo,
                _ => ErrorClass::UnrecoverableStage,
            },
            WorkerError::Ai(e) if e.is_retryable() => ErrorClass::RecoverableBackend,
            _ => ErrorClass::UnrecoverableStage,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::RecoverableBackend || is_retryable_message(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            WorkerError::RateLimited("429".into()).class(),
            ErrorClass::RecoverableBackend
        );
        assert_eq!(
            WorkerError::timeout("transcription", 300).class(),
            ErrorClass::RecoverableBackend
        );
        assert_eq!(
            WorkerError::fatal_io("no media").class(),
            ErrorClass::FatalIo
        );
        assert_eq!(
            WorkerError::from(MediaError::QualityTooLow {
                height: 480,
                threshold: 720
            })
            .class(),
            ErrorClass::DegradedQuality
        );
        assert_eq!(
            WorkerError::from(MediaError::YtDlpNotFound).class(),
            ErrorClass::FatalIo
        );
        assert_eq!(
            WorkerError::stage_failed("narration", "voice not found").class(),
            ErrorClass::UnrecoverableStage
        );
    }

    #[test]
    fn test_retryable_by_message() {
        assert!(WorkerError::backend("connection reset by peer").is_retryable());
        assert!(WorkerError::from(MediaError::download_failed("HTTP Error 429")).is_retryable());
        assert!(WorkerError::from(vshort_ai::AiError::api(503, "busy")).is_retryable());
        assert!(!WorkerError::backend("unsupported codec").is_retryable());
        assert!(!WorkerError::invalid_options("target must be positive").is_retryable());
    }

    #[test]
    fn test_all_strategies_display() {
        let err = WorkerError::AllStrategiesFailed {
            failures: vec!["ultra: boom".into(), "hd: bust".into()],
        };
        assert_eq!(err.to_string(), "All strategies failed: ultra: boom; hd: bust");
    }
}
