//! Highlight clip pipeline.
//!
//! This crate provides:
//! - The session orchestrator (`start` / `poll`)
//! - Acquisition, transcription, selection, script, narration, subtitle
//!   and composition stages with their fallback policies
//! - A channel-fed progress tracker with a staleness sweeper
//! - Backend traits and their production adapters
//! - Retry and strategy-chain helpers

pub mod backends;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod retry;
pub mod stages;
pub mod strategy;
pub mod tracker;

pub use backends::{
    Backends, DownloadBackend, MediaBackend, ProgressFn, SpeechToText, TextGenerator, TextToSpeech,
};
pub use config::{PipelineConfig, TrackerConfig};
pub use error::{ErrorClass, WorkerError, WorkerResult};
pub use logging::SessionLogger;
pub use orchestrator::Pipeline;
pub use strategy::{Strategy, StrategyOutcome, StrategyRunner};
pub use tracker::{ArtifactLocator, ProgressSender, ProgressTracker, TrackerMessage};
