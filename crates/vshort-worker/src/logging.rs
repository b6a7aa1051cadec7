//! Structured session logging utilities.
//!
//! Provides consistent, structured logging for pipeline runs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use vshort_models::{SessionKey, Stage};

/// Session logger for structured logging with consistent formatting.
///
/// Every line carries the session key and the operation name so one run
/// can be followed across stages.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session: String,
    operation: String,
}

impl SessionLogger {
    /// Create a new logger for a session and operation.
    pub fn new(key: &SessionKey, operation: &str) -> Self {
        Self {
            session: key.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Log the start of a run.
    pub fn log_start(&self, message: &str) {
        info!(
            session = %self.session,
            operation = %self.operation,
            "Session started: {}", message
        );
    }

    /// Log entry into a stage.
    pub fn log_stage(&self, stage: Stage, message: &str) {
        info!(
            session = %self.session,
            operation = %self.operation,
            stage = %stage,
            "Stage: {}", message
        );
    }

    /// Log a degraded result or a fallback.
    pub fn log_warning(&self, stage: Stage, message: &str) {
        warn!(
            session = %self.session,
            operation = %self.operation,
            stage = %stage,
            "Session warning: {}", message
        );
    }

    /// Log a failure with the underlying error text.
    pub fn log_error(&self, stage: Stage, message: &str) {
        error!(
            session = %self.session,
            operation = %self.operation,
            stage = %stage,
            "Session error: {}", message
        );
    }

    /// Log the end of a run.
    pub fn log_completion(&self, message: &str) {
        info!(
            session = %self.session,
            operation = %self.operation,
            "Session completed: {}", message
        );
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "session",
            session = %self.session,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_logger_creation() {
        let key = SessionKey::normalize("https://youtu.be/abc/");
        let logger = SessionLogger::new(&key, "highlight");

        assert_eq!(logger.session(), "https://youtu.be/abc");
        assert_eq!(logger.operation(), "highlight");
    }
}
