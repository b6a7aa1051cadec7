//! Re-encode and stream-copy modes for broken renders.

use std::path::Path;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Repair strategy, from most to least faithful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairMode {
    /// Re-encode while ignoring minor decode errors
    Lenient,
    /// Fast, lower-quality re-encode
    Fast,
    /// Remux without re-encoding
    StreamCopy,
}

impl RepairMode {
    /// Chain order.
    pub const CHAIN: &'static [RepairMode] =
        &[RepairMode::Lenient, RepairMode::Fast, RepairMode::StreamCopy];

    pub fn name(&self) -> &'static str {
        match self {
            RepairMode::Lenient => "lenient",
            RepairMode::Fast => "fast",
            RepairMode::StreamCopy => "stream_copy",
        }
    }

    /// Build the repair command.
    pub fn command(&self, input: &Path, output: &Path) -> FfmpegCommand {
        let cmd = FfmpegCommand::new(input, output);
        match self {
            RepairMode::Lenient => cmd
                .input_args(["-err_detect", "ignore_err"])
                .video_codec("libx264")
                .preset("medium")
                .crf(23)
                .output_args(["-pix_fmt", "yuv420p"])
                .audio_codec("aac")
                .audio_bitrate("128k")
                .faststart(),
            RepairMode::Fast => cmd
                .input_args(["-err_detect", "ignore_err"])
                .video_codec("libx264")
                .preset("ultrafast")
                .crf(28)
                .output_args(["-pix_fmt", "yuv420p"])
                .audio_codec("aac")
                .audio_bitrate("128k")
                .faststart(),
            RepairMode::StreamCopy => cmd.codec_copy().faststart(),
        }
    }
}

/// Run one repair mode.
pub async fn repair_video(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    mode: RepairMode,
    timeout_secs: u64,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    info!(
        input = %input.display(),
        output = %output.display(),
        mode = mode.name(),
        "Repairing video"
    );

    FfmpegRunner::new()
        .with_timeout(timeout_secs)
        .run(&mode.command(input, output))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_ignores_decode_errors() {
        let args = RepairMode::Lenient
            .command(Path::new("in.mp4"), Path::new("out.mp4"))
            .build_args();
        let err = args.iter().position(|a| a == "-err_detect").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(err < input);
        assert!(args.contains(&"medium".to_string()));
        assert!(args.contains(&"23".to_string()));
    }

    #[test]
    fn test_fast_mode() {
        let args = RepairMode::Fast
            .command(Path::new("in.mp4"), Path::new("out.mp4"))
            .build_args();
        assert!(args.contains(&"ultrafast".to_string()));
    }

    #[test]
    fn test_stream_copy_does_not_encode() {
        let args = RepairMode::StreamCopy
            .command(Path::new("in.mp4"), Path::new("out.mp4"))
            .build_args();
        assert!(args.contains(&"copy".to_string()));
        assert!(!args.contains(&"libx264".to_string()));
    }

    #[test]
    fn test_chain_order() {
        assert_eq!(RepairMode::CHAIN.len(), 3);
        assert_eq!(RepairMode::CHAIN[0], RepairMode::Lenient);
        assert_eq!(RepairMode::CHAIN[2], RepairMode::StreamCopy);
    }
}
