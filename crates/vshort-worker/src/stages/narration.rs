//! Text-to-speech narration.

use std::time::Duration;

use tracing::info;

use vshort_models::{ArtifactKind, MediaArtifact, Stage};

use crate::error::{WorkerError, WorkerResult};
use crate::retry::retry;
use crate::stages::StageContext;

/// Synthesized narration and its measured length.
#[derive(Debug, Clone)]
pub struct Narration {
    pub artifact: MediaArtifact,
    /// Probed from the audio file; the timing reference for captions
    pub duration: f64,
}

/// Synthesize the script with the session voice.
///
/// Errors are degraded by the caller: the clip then keeps its source audio.
pub async fn narrate(ctx: &StageContext, script: &str) -> WorkerResult<Narration> {
    let reporter = ctx.reporter(Stage::CreatingVoice);
    reporter.report(0.0, "Creating voice-over...");

    if script.trim().is_empty() {
        return Err(WorkerError::stage_failed("narration", "empty script"));
    }

    let voice = ctx
        .session
        .options
        .voice_id
        .as_deref()
        .unwrap_or(&ctx.config.default_voice);
    let output = ctx.work_path("narration.mp3");

    let bytes = retry(
        "narration",
        |attempt| {
            reporter.report(
                10.0 + 20.0 * attempt as f64,
                format!("Synthesizing voice (attempt {})", attempt + 1),
            );
            ctx.backends.tts.synthesize(script, voice, &output)
        },
        WorkerError::is_retryable,
        ctx.config.tts_attempts.max(1),
        |n| Duration::from_secs(1).saturating_mul(2u32.saturating_pow(n)),
    )
    .await
    .into_result()?;

    reporter.report(80.0, "Measuring narration");
    let duration = ctx.backends.media.duration(&output).await?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(WorkerError::stage_failed(
            "narration",
            format!("narration has no measurable duration ({})", duration),
        ));
    }

    info!(session = %ctx.session.key, voice, bytes, duration, "Narration ready");
    reporter.report(100.0, format!("Voice-over ready ({:.1}s)", duration));
    Ok(Narration {
        artifact: MediaArtifact::new(output, ArtifactKind::Narrated).validated(),
        duration,
    })
}
