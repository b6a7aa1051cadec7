//! Pipeline session identity and options.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::progress::Stage;
use crate::style::{BackgroundMusic, EditingStyle};

/// Normalized source-URL key identifying one pipeline session.
///
/// Two raw identifiers that normalize identically address the same session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Normalize a raw source identifier: trim whitespace, drop one trailing `/`.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        let normalized = trimmed.strip_suffix('/').unwrap_or(trimmed);
        Self(normalized.to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::normalize(s)
    }
}

/// Caller-supplied options for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineOptions {
    /// Offset into the source where the download window starts (seconds)
    #[serde(default)]
    pub start_offset: f64,
    /// Target duration of the final clip (seconds)
    #[serde(default = "default_target_duration")]
    pub target_duration: f64,
    /// Maximum length of the source window to fetch (seconds)
    #[serde(default = "default_max_window")]
    pub max_window: f64,
    /// Editing style filter variant
    #[serde(default)]
    pub editing_style: EditingStyle,
    /// Language code for transcription and script generation
    #[serde(default = "default_language")]
    pub language: String,
    /// Text-to-speech voice identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    /// Background music selector
    #[serde(default)]
    pub background_music: BackgroundMusic,
    /// Desired minimum source resolution (height in pixels)
    #[serde(default = "default_min_height")]
    pub min_height: u32,
}

fn default_target_duration() -> f64 {
    85.0
}

fn default_max_window() -> f64 {
    180.0
}

fn default_language() -> String {
    "fr".to_string()
}

fn default_min_height() -> u32 {
    1080
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            start_offset: 0.0,
            target_duration: default_target_duration(),
            max_window: default_max_window(),
            editing_style: EditingStyle::default(),
            language: default_language(),
            voice_id: None,
            background_music: BackgroundMusic::default(),
            min_height: default_min_height(),
        }
    }
}

impl PipelineOptions {
    /// Check the options for values no run could honor.
    pub fn validate(&self) -> Result<(), String> {
        if !self.start_offset.is_finite() || self.start_offset < 0.0 {
            return Err(format!("start offset must be >= 0, got {}", self.start_offset));
        }
        if !self.target_duration.is_finite() || self.target_duration <= 0.0 {
            return Err(format!(
                "target duration must be > 0, got {}",
                self.target_duration
            ));
        }
        if !self.max_window.is_finite() || self.max_window < self.target_duration {
            return Err(format!(
                "download window ({}) must cover the target duration ({})",
                self.max_window, self.target_duration
            ));
        }
        Ok(())
    }
}

/// One pipeline run for one source-video request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSession {
    /// Normalized session key
    pub key: SessionKey,
    /// Source URL as submitted (after URL extraction)
    pub source_url: String,
    /// Isolated working directory, removed at run end
    pub work_dir: PathBuf,
    /// Run options
    pub options: PipelineOptions,
    /// Stage currently executing
    pub stage: Stage,
    /// When the run started
    pub created_at: DateTime<Utc>,
}

impl PipelineSession {
    /// Create a new session positioned at the first stage.
    pub fn new(
        key: SessionKey,
        source_url: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            key,
            source_url: source_url.into(),
            work_dir: work_dir.into(),
            options,
            stage: Stage::Downloading,
            created_at: Utc::now(),
        }
    }

    /// Path of a file inside the session's working directory.
    pub fn work_path(&self, file_name: &str) -> PathBuf {
        self.work_dir.join(file_name)
    }
}
