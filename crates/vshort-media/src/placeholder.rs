//! Synthetic stand-in media for degraded runs.

use std::path::Path;
use tracing::warn;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::{OUTPUT_HEIGHT, OUTPUT_WIDTH};

/// Build the placeholder command: black vertical video with a silent track.
pub fn placeholder_command(output: &Path, duration_secs: f64) -> FfmpegCommand {
    FfmpegCommand::lavfi(
        format!(
            "color=c=black:s={}x{}:r=30:d={:.3}",
            OUTPUT_WIDTH, OUTPUT_HEIGHT, duration_secs
        ),
        output,
    )
    .lavfi_input("anullsrc=r=48000:cl=stereo")
    .output_arg("-t")
    .output_arg(format!("{:.3}", duration_secs))
    .video_codec("libx264")
    .preset("ultrafast")
    .output_args(["-pix_fmt", "yuv420p"])
    .audio_codec("aac")
    .audio_bitrate("128k")
    .output_arg("-shortest")
    .faststart()
}

/// Write a minimal valid video lasting `duration_secs`.
pub async fn generate_placeholder_video(
    output: impl AsRef<Path>,
    duration_secs: f64,
    timeout_secs: u64,
) -> MediaResult<()> {
    let output = output.as_ref();
    warn!(
        output = %output.display(),
        duration = duration_secs,
        "Generating placeholder video"
    );
    FfmpegRunner::new()
        .with_timeout(timeout_secs)
        .run(&placeholder_command(output, duration_secs))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_command() {
        let args = placeholder_command(Path::new("p.mp4"), 180.0).build_args();
        assert!(args.contains(&"color=c=black:s=1080x1920:r=30:d=180.000".to_string()));
        assert!(args.contains(&"anullsrc=r=48000:cl=stereo".to_string()));
        assert!(args.contains(&"-shortest".to_string()));
        assert_eq!(args.last().unwrap(), "p.mp4");
    }
}
