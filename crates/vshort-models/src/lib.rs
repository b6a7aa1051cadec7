//! Shared data models for the VShort highlight pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Session identity and pipeline options
//! - Progress records and stage events
//! - Transcript segments, selections and subtitle cues
//! - Media artifacts and probed stream metadata
//! - Editing styles and background music selection

pub mod artifact;
pub mod progress;
pub mod session;
pub mod style;
pub mod subtitle;
pub mod transcript;
pub mod utils;

// Re-export common types
pub use artifact::{ArtifactKind, MediaArtifact, MediaInfo};
pub use progress::{ArtifactLinks, ProgressRecord, ProgressUpdate, Stage};
pub use session::{PipelineOptions, PipelineSession, SessionKey};
pub use style::{BackgroundMusic, EditingStyle};
pub use subtitle::{format_ass_time, format_srt_time, SubtitleCue};
pub use transcript::{SelectedSegment, Transcript, TranscriptSegment, Word};
pub use utils::extract_url;
