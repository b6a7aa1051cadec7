//! Pipeline stages.
//!
//! Each stage applies its own retry and fallback policy and reports
//! stage-local progress through a [`StageReporter`].

pub mod acquisition;
pub mod composition;
pub mod narration;
pub mod script;
pub mod selector;
pub mod subtitles;
pub mod transcription;

use std::path::PathBuf;
use std::sync::Arc;

use vshort_models::{PipelineSession, Stage};

use crate::backends::Backends;
use crate::config::PipelineConfig;
use crate::logging::SessionLogger;
use crate::tracker::{ProgressSender, StageReporter};

/// Everything a stage needs for one session.
#[derive(Clone)]
pub struct StageContext {
    pub session: PipelineSession,
    pub config: Arc<PipelineConfig>,
    pub backends: Backends,
    pub progress: ProgressSender,
    pub logger: SessionLogger,
}

impl StageContext {
    /// Mark the session as entering `stage`.
    pub fn enter(&mut self, stage: Stage) {
        self.session.stage = stage;
        self.logger.log_stage(stage, "Entering stage");
    }

    pub fn reporter(&self, stage: Stage) -> StageReporter {
        self.progress.stage(&self.session.key, stage)
    }

    pub fn work_path(&self, name: &str) -> PathBuf {
        self.session.work_path(name)
    }
}
