//! Audio track extraction for speech recognition.

use std::path::Path;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Container/codec used for the extracted track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// 16 kHz mono PCM WAV
    Wav16kMono,
    /// 16 kHz mono MP3, a much smaller upload
    Mp3Mono,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav16kMono => "wav",
            AudioFormat::Mp3Mono => "mp3",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav16kMono => "audio/wav",
            AudioFormat::Mp3Mono => "audio/mpeg",
        }
    }

    fn codec_args(&self) -> &'static [&'static str] {
        match self {
            AudioFormat::Wav16kMono => &["-acodec", "pcm_s16le"],
            AudioFormat::Mp3Mono => &["-acodec", "libmp3lame", "-b:a", "64k"],
        }
    }
}

/// Build the extraction command.
pub fn extraction_command(input: &Path, output: &Path, format: AudioFormat) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .output_arg("-vn")
        .output_args(format.codec_args().iter().copied())
        .output_args(["-ar", "16000", "-ac", "1"])
}

/// Extract a mono 16 kHz audio track.
pub async fn extract_audio(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    format: AudioFormat,
    timeout_secs: u64,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    info!(
        input = %input.display(),
        output = %output.display(),
        format = format.extension(),
        "Extracting audio"
    );

    let cmd = extraction_command(input, output, format);
    FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await
}
