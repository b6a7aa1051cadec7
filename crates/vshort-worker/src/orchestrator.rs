//! Session orchestration: the caller-facing `start`/`poll` pair.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use vshort_models::{
    extract_url, PipelineOptions, PipelineSession, ProgressRecord, ProgressUpdate, SessionKey,
    Stage,
};

use crate::backends::Backends;
use crate::config::{PipelineConfig, TrackerConfig};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::SessionLogger;
use crate::metrics;
use crate::stages::composition::{compose, FinalClip};
use crate::stages::subtitles::build_subtitles;
use crate::stages::{acquisition, narration, script, selector, transcription, StageContext};
use crate::tracker::{ArtifactLocator, DiagnosticLog, ProgressSender, ProgressTracker};

/// Deliverable plus everything that degraded it.
#[derive(Debug)]
struct RunSummary {
    clip: FinalClip,
    degraded: Vec<String>,
}

async fn timed<F: Future>(stage: Stage, fut: F) -> F::Output {
    let started = Instant::now();
    let output = fut.await;
    metrics::record_stage_duration(stage.as_str(), started.elapsed().as_secs_f64());
    output
}

/// Runs highlight sessions and answers progress polls.
///
/// Must be created inside a Tokio runtime: construction spawns the tracker's
/// consumer and sweeper tasks. Dropping the pipeline stops the sweeper.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    tracker: ProgressTracker,
    progress: ProgressSender,
    backends: Backends,
    sweeper: JoinHandle<()>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, tracker_config: TrackerConfig, backends: Backends) -> Self {
        let locator = ArtifactLocator::new(&config.output_dir, config.public_base.clone());
        let diagnostics = config.diagnostic_log.clone().map(DiagnosticLog::new);
        let tracker = ProgressTracker::new(tracker_config, locator, diagnostics);
        let progress = tracker.spawn_consumer();
        let sweeper = tracker.spawn_sweeper();

        Self {
            config: Arc::new(config),
            tracker,
            progress,
            backends,
            sweeper,
        }
    }

    /// Production pipeline configured from the environment.
    pub fn from_env() -> WorkerResult<Self> {
        let config = PipelineConfig::from_env();
        let backends = Backends::from_env(&config)?;
        Ok(Self::new(config, TrackerConfig::from_env(), backends))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Start a run in the background and return its session key.
    ///
    /// `source` may be pasted text; the first http(s) URL in it is used.
    /// Invalid input is rejected here, before anything is spawned.
    pub fn start(&self, source: &str, options: PipelineOptions) -> WorkerResult<SessionKey> {
        let url = extract_url(source)
            .ok_or_else(|| WorkerError::invalid_options("no http(s) URL in source"))?;
        options.validate().map_err(WorkerError::invalid_options)?;

        let key = SessionKey::normalize(&url);
        let work_dir = self.config.work_dir.join(Uuid::new_v4().to_string());
        let session = PipelineSession::new(key.clone(), url, work_dir, options);
        let logger = SessionLogger::new(&key, "highlight");
        let span = logger.create_span();

        let ctx = StageContext {
            session,
            config: self.config.clone(),
            backends: self.backends.clone(),
            progress: self.progress.clone(),
            logger,
        };
        let locator = self.tracker.locator().clone();
        tokio::spawn(run(ctx, locator).instrument(span));

        Ok(key)
    }

    /// Latest progress for a raw session identifier. Never fails.
    pub async fn poll(&self, source: &str) -> ProgressRecord {
        let raw = extract_url(source).unwrap_or_else(|| source.to_string());
        self.tracker.poll(&raw).await
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

/// One session from acquisition to the terminal record, then cleanup.
async fn run(mut ctx: StageContext, locator: ArtifactLocator) {
    let key = ctx.session.key.clone();
    let work_dir = ctx.session.work_dir.clone();
    ctx.logger.log_start(&ctx.session.source_url);

    let result = match tokio::fs::create_dir_all(&work_dir).await {
        Ok(()) => execute(&mut ctx).await,
        Err(e) => Err(WorkerError::fatal_io(format!(
            "working directory {}: {}",
            work_dir.display(),
            e
        ))),
    };

    match result {
        Ok(summary) => {
            let path = summary.clip.artifact.path.clone();

            let message = if summary.degraded.is_empty() {
                metrics::record_session("complete");
                "Processing complete".to_string()
            } else {
                metrics::record_session("degraded");
                format!(
                    "Error: {} (completed in degraded mode)",
                    summary.degraded.join("; ")
                )
            };
            ctx.progress.report(
                ProgressUpdate::new(key.clone(), Stage::Complete, 100, message)
                    .with_artifact(locator.links_for(&path)),
            );
            ctx.logger.log_completion(&format!(
                "{} (accepted by {}, {} warnings)",
                path.display(),
                summary.clip.accepted_by,
                summary.degraded.len()
            ));
        }
        Err(e) => {
            metrics::record_session("failed");
            ctx.logger.log_error(ctx.session.stage, &e.to_string());
            ctx.progress.report(ProgressUpdate::new(
                key.clone(),
                Stage::Finalizing,
                100,
                format!("Error: {}", e),
            ));
        }
    }

    if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
        warn!(session = %key, dir = %work_dir.display(), "Failed to clean working directory: {}", e);
    }
}

async fn execute(ctx: &mut StageContext) -> WorkerResult<RunSummary> {
    let mut degraded = Vec::new();

    ctx.enter(Stage::Downloading);
    let media = timed(Stage::Downloading, acquisition::acquire(ctx)).await?;
    degraded.extend(media.degraded.clone());
    info!(
        session = %ctx.session.key,
        tier = media.tier,
        height = media.info.height,
        duration = media.info.duration,
        "Source acquired"
    );

    ctx.enter(Stage::Transcribing);
    let transcription = timed(Stage::Transcribing, transcription::transcribe(ctx, &media.artifact)).await;
    if let Some(e) = &transcription.error {
        degraded.push(format!("transcription failed ({})", e));
    }

    ctx.enter(Stage::GeneratingScript);
    let target = ctx.session.options.target_duration;
    let selected = selector::select_segments(&transcription.transcript.segments, target);
    let clip_secs: f64 = selected.iter().map(|s| s.duration()).sum();
    info!(
        session = %ctx.session.key,
        segments = selected.len(),
        clip_secs,
        target,
        "Segments selected"
    );
    let script = timed(
        Stage::GeneratingScript,
        script::synthesize_script(ctx, &transcription.transcript.text),
    )
    .await;
    if let Some(e) = &script.error {
        degraded.push(format!("script generation failed ({})", e));
    }

    ctx.enter(Stage::CreatingVoice);
    let narration = match timed(Stage::CreatingVoice, narration::narrate(ctx, &script.text)).await {
        Ok(narration) => Some(narration),
        Err(e) => {
            ctx.logger.log_warning(
                Stage::CreatingVoice,
                &format!("Narration failed, keeping source audio: {}", e),
            );
            ctx.reporter(Stage::CreatingVoice)
                .report(100.0, format!("Error: narration failed ({})", e));
            degraded.push(format!("narration failed ({})", e));
            None
        }
    };

    ctx.enter(Stage::AddingSubtitles);
    let subtitles = timed(
        Stage::AddingSubtitles,
        build_subtitles(ctx, &script.text, narration.as_ref(), &selected),
    )
    .await;
    if subtitles.is_none() {
        degraded.push("subtitles unavailable".to_string());
    }

    ctx.enter(Stage::Finalizing);
    let clip = timed(
        Stage::Finalizing,
        compose(ctx, &media.artifact, &selected, narration.as_ref(), subtitles.as_ref()),
    )
    .await?;
    degraded.extend(clip.warnings.iter().cloned());

    Ok(RunSummary { clip, degraded })
}
