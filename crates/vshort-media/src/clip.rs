//! Segment cutting and concatenation.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Cut `[start, start + duration)` out of a file.
///
/// Re-encodes so cuts land on exact timestamps rather than keyframes;
/// `stream_copy` trades accuracy for speed.
pub async fn extract_segment(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start_secs: f64,
    duration: f64,
    stream_copy: bool,
    timeout_secs: u64,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    info!(
        "Extracting segment: {} -> {} (start: {:.2}s, duration: {:.2}s)",
        input.display(),
        output.display(),
        start_secs,
        duration
    );

    let cmd = segment_command(input, output, start_secs, duration, stream_copy);
    FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await
}

fn segment_command(
    input: &Path,
    output: &Path,
    start_secs: f64,
    duration: f64,
    stream_copy: bool,
) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(input, output)
        .seek(start_secs.max(0.0))
        .duration(duration);

    if stream_copy {
        cmd.codec_copy()
    } else {
        cmd.video_codec("libx264")
            .preset("veryfast")
            .crf(18)
            .audio_codec("aac")
            .audio_bitrate("192k")
            .output_args(["-ar", "48000"])
    }
}

/// Render the concat demuxer list for a set of files.
pub fn concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| {
            let escaped = p.to_string_lossy().replace('\'', "'\\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

/// Join already-encoded segments with the concat demuxer.
pub async fn concat_segments(
    inputs: &[PathBuf],
    list_path: impl AsRef<Path>,
    output: impl AsRef<Path>,
    timeout_secs: u64,
) -> MediaResult<()> {
    if inputs.is_empty() {
        return Err(MediaError::internal("No segments to concatenate"));
    }

    let list_path = list_path.as_ref();
    let output = output.as_ref();
    tokio::fs::write(list_path, concat_list(inputs)).await?;

    info!(
        segments = inputs.len(),
        output = %output.display(),
        "Concatenating segments"
    );

    let cmd = FfmpegCommand::new(list_path, output)
        .input_args(["-f", "concat", "-safe", "0"])
        .codec_copy()
        .faststart();

    FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await
}
