//! Segment extraction, final render and the verify/repair chain.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tracing::{debug, info, warn};

use vshort_media::{ComposeRequest, RepairMode};
use vshort_models::{ArtifactKind, MediaArtifact, SelectedSegment, Stage};

use crate::error::{WorkerError, WorkerResult};
use crate::stages::narration::Narration;
use crate::stages::subtitles::SubtitleTrack;
use crate::stages::StageContext;
use crate::strategy::{Strategy, StrategyRunner};
use crate::tracker::{ArtifactLocator, StageReporter};

/// Extra time a repair strategy gets on top of the ffmpeg budget.
const STRATEGY_GRACE: Duration = Duration::from_secs(30);

/// Verified deliverable in the output directory.
#[derive(Debug, Clone)]
pub struct FinalClip {
    pub artifact: MediaArtifact,
    /// Verification step that accepted it (`verify` or a repair mode)
    pub accepted_by: &'static str,
    /// Problems that degraded the clip without stopping it
    pub warnings: Vec<String>,
}

async fn non_empty(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Cut the selected segments out of the source.
///
/// Segments that fail to extract are skipped; with none left the whole
/// source stands in.
async fn extract_segments(
    ctx: &StageContext,
    source: &MediaArtifact,
    selected: &[SelectedSegment],
    reporter: &StageReporter,
    warnings: &mut Vec<String>,
) -> Vec<PathBuf> {
    let mut parts = Vec::with_capacity(selected.len());
    let total = selected.len().max(1);

    for (i, segment) in selected.iter().enumerate() {
        let output = ctx.work_path(&format!("segment_{:03}.mp4", i));
        match ctx
            .backends
            .media
            .trim(source.path(), &output, segment.start(), segment.duration())
            .await
        {
            Ok(()) => parts.push(output),
            Err(e) => {
                warn!(
                    session = %ctx.session.key,
                    segment = i,
                    start = segment.start(),
                    "Segment extraction failed, skipping: {}", e
                );
            }
        }
        reporter.report(
            30.0 * (i + 1) as f64 / total as f64,
            format!("Extracted segment {}/{}", i + 1, selected.len()),
        );
    }

    if parts.is_empty() {
        warnings.push("no segment could be extracted, using the full source".to_string());
        parts.push(source.path().to_path_buf());
    }
    parts
}

async fn combine(ctx: &StageContext, parts: &[PathBuf], warnings: &mut Vec<String>) -> MediaArtifact {
    if parts.len() == 1 {
        return MediaArtifact::new(parts[0].clone(), ArtifactKind::ExtractedSegment);
    }

    let combined = ctx.work_path("combined.mp4");
    let list = ctx.work_path("concat.txt");
    match ctx.backends.media.concat(parts, &list, &combined).await {
        Ok(()) => MediaArtifact::new(combined, ArtifactKind::Combined),
        Err(e) => {
            warnings.push(format!("concatenation failed, using first segment only ({})", e));
            MediaArtifact::new(parts[0].clone(), ArtifactKind::ExtractedSegment)
        }
    }
}

async fn music_track(ctx: &StageContext) -> Option<PathBuf> {
    let name = ctx.session.options.background_music.track_name()?;
    let path = ctx.config.music_dir.join(format!("{}.mp3", name));
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        Some(path)
    } else {
        warn!(session = %ctx.session.key, track = name, "Background music not found, skipping");
        None
    }
}

fn verify_strategy<'a>(ctx: &'a StageContext, candidate: &'a Path, budget: Duration) -> Strategy<'a, PathBuf> {
    Strategy::new("verify", budget, move || {
        async move {
            if ctx.backends.media.is_valid(candidate).await {
                Ok(candidate.to_path_buf())
            } else {
                Err(WorkerError::stage_failed("finalize", "no decodable video stream"))
            }
        }
        .boxed()
    })
}

fn repair_strategy<'a>(
    ctx: &'a StageContext,
    input: &'a Path,
    mode: RepairMode,
    budget: Duration,
) -> Strategy<'a, PathBuf> {
    let output = ctx.work_path(&format!("repaired_{}.mp4", mode.name()));
    Strategy::new(mode.name(), budget, move || {
        async move {
            ctx.backends.media.repair(input, &output, mode).await?;
            if ctx.backends.media.is_valid(&output).await {
                Ok(output)
            } else {
                Err(WorkerError::stage_failed(
                    "finalize",
                    format!("{} repair produced no decodable video", mode.name()),
                ))
            }
        }
        .boxed()
    })
}

/// Render the clip, verify it and publish it to the output directory.
///
/// Fails only when neither the render nor any repair yields a valid file.
pub async fn compose(
    ctx: &StageContext,
    source: &MediaArtifact,
    selected: &[SelectedSegment],
    narration: Option<&Narration>,
    subtitles: Option<&SubtitleTrack>,
) -> WorkerResult<FinalClip> {
    let reporter = ctx.reporter(Stage::Finalizing);
    reporter.report(0.0, "Extracting segments...");
    let mut warnings = Vec::new();

    let parts = extract_segments(ctx, source, selected, &reporter, &mut warnings).await;
    let combined = combine(ctx, &parts, &mut warnings).await;

    reporter.report(30.0, "Rendering final video...");
    let candidate = ctx.work_path("final_candidate.mp4");
    let request = ComposeRequest {
        video: combined.path.clone(),
        narration: narration.map(|n| n.artifact.path.clone()),
        subtitles: subtitles.map(|s| s.path.clone()),
        music: music_track(ctx).await,
        music_volume: ctx.config.music_volume,
        style: ctx.session.options.editing_style,
        output: candidate.clone(),
    };

    let render_reporter = reporter.clone();
    let on_progress = Arc::new(move |p: f64| {
        render_reporter.report(30.0 + 0.55 * p.clamp(0.0, 100.0), format!("Rendering: {:.0}%", p));
    });
    if let Err(e) = ctx.backends.media.render(&request, on_progress).await {
        ctx.logger
            .log_warning(Stage::Finalizing, &format!("Render failed, attempting repair: {}", e));
        warnings.push(format!("render failed ({})", e));
    }

    reporter.report(85.0, "Verifying output...");
    let repair_input = if non_empty(&candidate).await {
        candidate.clone()
    } else {
        debug!(session = %ctx.session.key, "No render output, repairing the combined clip");
        combined.path.clone()
    };

    let budget = Duration::from_secs(ctx.config.ffmpeg_timeout_secs).saturating_add(STRATEGY_GRACE);
    let mut strategies = vec![verify_strategy(ctx, &candidate, budget)];
    strategies.extend(
        RepairMode::CHAIN
            .iter()
            .map(|mode| repair_strategy(ctx, &repair_input, *mode, budget)),
    );

    let outcome = StrategyRunner::new("finalize")
        .run(strategies)
        .await
        .map_err(|e| WorkerError::fatal_io(format!("final video could not be produced: {}", e)))?;
    if outcome.fell_back() {
        warnings.push(format!("output repaired ({})", outcome.name));
    }

    reporter.report(95.0, "Saving final video...");
    let output_dir = &ctx.config.output_dir;
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| WorkerError::fatal_io(format!("output directory {}: {}", output_dir.display(), e)))?;
    let destination = output_dir.join(ArtifactLocator::file_name(Utc::now().timestamp_millis()));
    tokio::fs::copy(&outcome.value, &destination)
        .await
        .map_err(|e| WorkerError::fatal_io(format!("copy to {}: {}", destination.display(), e)))?;
    let destination = tokio::fs::canonicalize(&destination).await.unwrap_or(destination);

    // Registered before the 100% report so auto-completion resolves this file
    ctx.progress
        .register_artifact(ctx.session.key.clone(), destination.clone());
    reporter.report(100.0, "Final video saved");

    info!(
        session = %ctx.session.key,
        path = %destination.display(),
        accepted_by = outcome.name,
        warnings = warnings.len(),
        "Final video saved"
    );
    Ok(FinalClip {
        artifact: MediaArtifact::new(destination, ArtifactKind::Final).validated(),
        accepted_by: outcome.name,
        warnings,
    })
}
