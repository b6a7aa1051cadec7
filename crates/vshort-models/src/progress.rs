//! Progress records for polling pipeline liveness.
//!
//! One `ProgressRecord` exists per session key. Stages emit
//! `ProgressUpdate` messages; the tracker folds them into records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::session::SessionKey;

/// Named pipeline phase as seen by a polling caller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fetching source media
    #[default]
    Downloading,
    /// Speech-to-text
    Transcribing,
    /// Script rewrite
    GeneratingScript,
    /// Text-to-speech
    CreatingVoice,
    /// Cue generation and burn-in
    AddingSubtitles,
    /// Composition and verification
    Finalizing,
    /// Deliverable available
    Complete,
}

impl Stage {
    /// Get string representation of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Downloading => "downloading",
            Stage::Transcribing => "transcribing",
            Stage::GeneratingScript => "generating_script",
            Stage::CreatingVoice => "creating_voice",
            Stage::AddingSubtitles => "adding_subtitles",
            Stage::Finalizing => "finalizing",
            Stage::Complete => "complete",
        }
    }

    /// Check if this is the terminal stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete)
    }

    /// Share of the overall percent scale owned by this stage.
    pub fn percent_range(&self) -> (u8, u8) {
        match self {
            Stage::Downloading => (0, 20),
            Stage::Transcribing => (20, 40),
            Stage::GeneratingScript => (40, 50),
            Stage::CreatingVoice => (50, 60),
            Stage::AddingSubtitles => (60, 70),
            Stage::Finalizing => (70, 100),
            Stage::Complete => (100, 100),
        }
    }

    /// Map a stage-local percentage (0-100) onto the overall scale.
    pub fn scale_percent(&self, local: f64) -> u8 {
        let (lo, hi) = self.percent_range();
        let local = if local.is_finite() { local.clamp(0.0, 100.0) } else { 0.0 };
        (lo as f64 + (hi - lo) as f64 * local / 100.0).round() as u8
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Locator for a finished deliverable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLinks {
    /// Streaming URL
    pub video_url: String,
    /// Download URL
    pub download_url: String,
    /// Suggested file name
    pub file_name: String,
    /// Absolute path in the output store
    pub path: PathBuf,
}

/// Latest known state of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Current stage
    pub stage: Stage,
    /// Progress percentage (0-100)
    pub percent: u8,
    /// Human-readable status or last error text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When the record was last written
    pub last_updated: DateTime<Utc>,
    /// Deliverable locator, set on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactLinks>,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            stage: Stage::Downloading,
            percent: 0,
            message: Some("Starting process...".to_string()),
            last_updated: Utc::now(),
            artifact: None,
        }
    }
}

impl ProgressRecord {
    /// Seconds since the record was last written.
    pub fn idle_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_updated).num_seconds()
    }

    /// Whether the message carries error text.
    pub fn has_error(&self) -> bool {
        self.message
            .as_deref()
            .map(|m| m.contains("Error"))
            .unwrap_or(false)
    }

    /// A run that ended without a deliverable parks at finalizing/100 with error text.
    pub fn is_failed(&self) -> bool {
        self.stage == Stage::Finalizing && self.percent == 100 && self.has_error()
    }
}

/// Structured progress message emitted by a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Session the update belongs to
    pub key: SessionKey,
    /// Stage being reported
    pub stage: Stage,
    /// Percentage (clamped to 100 on construction)
    pub percent: u8,
    /// Optional status text
    pub message: Option<String>,
    /// Deliverable locator, when the update completes the session
    pub artifact: Option<ArtifactLinks>,
}

impl ProgressUpdate {
    /// Create an update without an artifact.
    pub fn new(key: SessionKey, stage: Stage, percent: u8, message: impl Into<String>) -> Self {
        Self {
            key,
            stage,
            percent: percent.min(100),
            message: Some(message.into()),
            artifact: None,
        }
    }

    /// Attach a deliverable locator.
    pub fn with_artifact(mut self, artifact: ArtifactLinks) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// Fold this update into a record, stamping `last_updated`.
    pub fn into_record(self, now: DateTime<Utc>) -> ProgressRecord {
        ProgressRecord {
            stage: self.stage,
            percent: self.percent,
            message: self.message,
            last_updated: now,
            artifact: self.artifact,
        }
    }
}
