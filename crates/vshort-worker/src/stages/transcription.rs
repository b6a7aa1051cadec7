//! Speech-to-text with retry, re-extraction and a placeholder fallback.
//!
//! This stage never fails: whatever happens, the pipeline gets a
//! transcript, possibly the placeholder one.

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use vshort_media::AudioFormat;
use vshort_models::{MediaArtifact, Stage, Transcript, TranscriptSegment, Word};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{retry, RetryResult};
use crate::stages::StageContext;
use crate::tracker::StageReporter;

/// Filler used when no transcript can be obtained.
pub const PLACEHOLDER_TEXT: &str = "No transcript available for this video";

/// What the stage produced.
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub transcript: Transcript,
    /// The transcript is the placeholder
    pub placeholder: bool,
    /// Last error seen before falling back
    pub error: Option<String>,
}

/// Single segment spanning `[0, duration]` with evenly spaced word timings.
pub fn placeholder_transcript(duration: f64) -> Transcript {
    let duration = if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        1.0
    };
    let tokens: Vec<&str> = PLACEHOLDER_TEXT.split_whitespace().collect();
    let step = duration / tokens.len() as f64;
    let words = tokens
        .iter()
        .enumerate()
        .map(|(i, w)| Word::new(*w, step * i as f64, step * (i + 1) as f64))
        .collect();

    Transcript {
        text: PLACEHOLDER_TEXT.to_string(),
        segments: vec![TranscriptSegment::new(0.0, duration, PLACEHOLDER_TEXT).with_words(words)],
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Transcribe the acquired media within the stage budget.
pub async fn transcribe(ctx: &StageContext, media: &MediaArtifact) -> TranscriptionOutcome {
    let reporter = ctx.reporter(Stage::Transcribing);
    reporter.report(0.0, "Transcribing audio...");

    let budget = ctx.config.transcribe_budget;
    let result = match tokio::time::timeout(budget, attempt_all(ctx, media, &reporter)).await {
        Ok(result) => result,
        Err(_) => Err(WorkerError::timeout("transcription", budget.as_secs())),
    };

    match result {
        Ok(transcript) => {
            info!(
                session = %ctx.session.key,
                segments = transcript.segments.len(),
                words = transcript.text.split_whitespace().count(),
                "Transcript ready"
            );
            reporter.report(100.0, "Transcription complete");
            TranscriptionOutcome {
                transcript,
                placeholder: false,
                error: None,
            }
        }
        Err(e) => {
            let message = e.to_string();
            ctx.logger
                .log_warning(Stage::Transcribing, &format!("Using placeholder transcript: {}", message));
            metrics::record_placeholder("transcription");
            reporter.report(
                100.0,
                format!("Error: transcription failed, using placeholder ({})", message),
            );
            TranscriptionOutcome {
                transcript: placeholder_transcript(ctx.session.options.target_duration),
                placeholder: true,
                error: Some(message),
            }
        }
    }
}

async fn submit(
    ctx: &StageContext,
    audio: &Path,
    format: AudioFormat,
) -> WorkerResult<Transcript> {
    let transcript = ctx
        .backends
        .stt
        .transcribe(audio, format.mime_type(), &ctx.session.options.language)
        .await?;

    if transcript.text.trim().is_empty() && transcript.valid_segments().is_empty() {
        return Err(WorkerError::stage_failed("transcription", "empty transcript"));
    }
    Ok(transcript)
}

/// Retry loop on a WAV extraction, then one MP3 re-extraction attempt.
async fn attempt_all(
    ctx: &StageContext,
    media: &MediaArtifact,
    reporter: &StageReporter,
) -> WorkerResult<Transcript> {
    let base = ctx.config.transcribe_backoff;
    let max_attempts = ctx.config.transcribe_attempts.max(1);
    let wav = ctx.work_path("audio.wav");
    let wav_path: &Path = &wav;

    reporter.report(5.0, "Extracting audio");
    let (last_error, attempts) = match ctx
        .backends
        .media
        .extract_audio(media.path(), wav_path, AudioFormat::Wav16kMono)
        .await
    {
        Ok(()) => {
            let result = retry(
                "transcription",
                |attempt| {
                    reporter.report(
                        10.0 + 60.0 * attempt as f64 / max_attempts as f64,
                        format!("Transcribing (attempt {}/{})", attempt + 1, max_attempts),
                    );
                    submit(ctx, wav_path, AudioFormat::Wav16kMono)
                },
                WorkerError::is_retryable,
                max_attempts,
                |n| backoff(base, n),
            )
            .await;

            match result {
                RetryResult::Success(transcript) => return Ok(transcript),
                RetryResult::Failed { error, attempts } => (error, attempts),
            }
        }
        Err(e) => (WorkerError::from(e), 0),
    };

    warn!(
        session = %ctx.session.key,
        attempts,
        "Transcription attempts exhausted, re-extracting audio: {}",
        last_error
    );

    if attempts > 0 && last_error.is_retryable() {
        tokio::time::sleep(backoff(base, attempts - 1)).await;
    }

    reporter.report(80.0, "Retrying transcription with re-extracted audio");
    let mp3 = ctx.work_path("audio_fallback.mp3");
    ctx.backends
        .media
        .extract_audio(media.path(), &mp3, AudioFormat::Mp3Mono)
        .await?;
    submit(ctx, &mp3, AudioFormat::Mp3Mono).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_transcript_timings() {
        let transcript = placeholder_transcript(70.0);
        assert_eq!(transcript.text, PLACEHOLDER_TEXT);
        assert_eq!(transcript.segments.len(), 1);

        let segment = &transcript.segments[0];
        assert_eq!(segment.start, 0.0);
        assert_eq!(segment.end, 70.0);
        assert_eq!(segment.words.len(), 7);
        assert_eq!(segment.words[0].end, 10.0);
        assert_eq!(segment.words[6].end, 70.0);
        assert!(segment.words.windows(2).all(|w| w[0].end <= w[1].start));
    }

    #[test]
    fn test_placeholder_transcript_bad_duration() {
        let transcript = placeholder_transcript(f64::NAN);
        assert!(transcript.segments[0].is_valid());
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_secs(2);
        assert_eq!(backoff(base, 0), Duration::from_secs(2));
        assert_eq!(backoff(base, 1), Duration::from_secs(4));
        assert_eq!(backoff(base, 2), Duration::from_secs(8));
    }
}
