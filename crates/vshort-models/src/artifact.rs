//! Media artifacts handed between stages.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What a media artifact is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Source media as acquired
    Raw,
    /// A cut out of the source
    ExtractedSegment,
    /// Selected segments concatenated
    Combined,
    /// Narration audio
    Narrated,
    /// Rendered clip with burned-in subtitles
    Subtitled,
    /// Verified deliverable
    Final,
}

/// A file produced by one stage and consumed by the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    /// Whether the file passed stream validation
    pub validated: bool,
}

impl MediaArtifact {
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        Self {
            path: path.into(),
            kind,
            validated: false,
        }
    }

    pub fn validated(mut self) -> Self {
        self.validated = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Probed stream metadata of a media file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Video codec name
    pub codec: String,
    /// Bitrate in bits per second
    pub bitrate: Option<u64>,
    pub has_audio: bool,
}

impl MediaInfo {
    /// Whether the vertical resolution reaches `threshold`.
    pub fn meets_height(&self, threshold: u32) -> bool {
        self.height >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_validated() {
        let artifact = MediaArtifact::new("/tmp/a.mp4", ArtifactKind::Raw);
        assert!(!artifact.validated);
        assert!(artifact.validated().validated);
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ArtifactKind::ExtractedSegment).unwrap();
        assert_eq!(json, "\"extracted_segment\"");
    }

    #[test]
    fn test_meets_height() {
        let info = MediaInfo {
            height: 720,
            ..Default::default()
        };
        assert!(info.meets_height(720));
        assert!(!info.meets_height(1080));
    }
}
