//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the embedding process decides
//! which recorder (if any) is installed.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const STAGE_FALLBACKS_TOTAL: &str = "vshort_stage_fallbacks_total";
    pub const BACKEND_RETRIES_TOTAL: &str = "vshort_backend_retries_total";
    pub const PLACEHOLDERS_TOTAL: &str = "vshort_placeholders_total";
    pub const SESSIONS_TOTAL: &str = "vshort_sessions_total";
    pub const STAGE_DURATION_SECONDS: &str = "vshort_stage_duration_seconds";
}

/// Record a strategy that failed and handed over to the next one.
pub fn record_fallback(chain: &str, strategy: &str) {
    let labels = [
        ("chain", chain.to_string()),
        ("strategy", strategy.to_string()),
    ];
    counter!(names::STAGE_FALLBACKS_TOTAL, &labels).increment(1);
}

/// Record a retried backend call.
pub fn record_retry(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!(names::BACKEND_RETRIES_TOTAL, &labels).increment(1);
}

/// Record a placeholder substituted for a failed stage.
pub fn record_placeholder(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::PLACEHOLDERS_TOTAL, &labels).increment(1);
}

/// Record a session outcome (`complete`, `degraded`, `failed`).
pub fn record_session(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::SESSIONS_TOTAL, &labels).increment(1);
}

/// Record how long a stage took.
pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}
