//! Final composition: style filter, burned-in subtitles, narration and music.

use std::path::PathBuf;
use tracing::info;

use vshort_models::EditingStyle;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{music_mix_graph, video_graph};
use crate::progress::FfmpegProgress;

/// Inputs for one render.
#[derive(Debug, Clone)]
pub struct ComposeRequest {
    /// Combined source video
    pub video: PathBuf,
    /// Narration track replacing the source audio
    pub narration: Option<PathBuf>,
    /// ASS file to burn in
    pub subtitles: Option<PathBuf>,
    /// Background music, looped under the main audio
    pub music: Option<PathBuf>,
    pub music_volume: f64,
    pub style: EditingStyle,
    pub output: PathBuf,
}

impl ComposeRequest {
    /// Build the ffmpeg command for this request.
    pub fn build_command(&self) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(&self.video, &self.output);
        let mut graph = video_graph(self.style, self.subtitles.as_deref());

        let voice = match &self.narration {
            Some(narration) => {
                cmd = cmd.input(narration);
                "1:a"
            }
            None => "0:a",
        };

        let audio_map = match &self.music {
            Some(music) => {
                let music_idx = cmd.input_count();
                cmd = cmd.input(music).input_args(["-stream_loop", "-1"]);
                graph.push(';');
                graph.push_str(&music_mix_graph(
                    voice,
                    &format!("{}:a", music_idx),
                    self.music_volume,
                ));
                "[a]".to_string()
            }
            None if self.narration.is_some() => voice.to_string(),
            // Source audio is optional on the combined clip
            None => "0:a?".to_string(),
        };

        cmd.filter_complex(graph)
            .map("[v]")
            .map(audio_map)
            .video_codec("libx264")
            .preset("slow")
            .crf(16)
            .output_args(["-maxrate", "8M", "-bufsize", "16M", "-pix_fmt", "yuv420p", "-r", "30"])
            .audio_codec("aac")
            .audio_bitrate("320k")
            .output_args(["-ar", "48000", "-shortest"])
            .faststart()
    }
}

/// Render the candidate final clip.
pub async fn render<F>(request: &ComposeRequest, timeout_secs: u64, on_progress: F) -> MediaResult<()>
where
    F: Fn(FfmpegProgress) + Send + 'static,
{
    if !request.video.exists() {
        return Err(MediaError::FileNotFound(request.video.clone()));
    }

    info!(
        video = %request.video.display(),
        output = %request.output.display(),
        style = %request.style,
        narration = request.narration.is_some(),
        subtitles = request.subtitles.is_some(),
        music = request.music.is_some(),
        "Rendering final clip"
    );

    let cmd = request.build_command();
    FfmpegRunner::new()
        .with_timeout(timeout_secs)
        .run_with_progress(&cmd, on_progress)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ComposeRequest {
        ComposeRequest {
            video: PathBuf::from("combined.mp4"),
            narration: None,
            subtitles: None,
            music: None,
            music_volume: 0.1,
            style: EditingStyle::Dynamic,
            output: PathBuf::from("final.mp4"),
        }
    }

    fn mapped(args: &[String]) -> Vec<String> {
        args.windows(2)
            .filter(|w| w[0] == "-map")
            .map(|w| w[1].clone())
            .collect()
    }

    #[test]
    fn test_narration_replaces_source_audio() {
        let mut req = base();
        req.narration = Some(PathBuf::from("voice.mp3"));
        req.subtitles = Some(PathBuf::from("/tmp/s.ass"));
        let args = req.build_command().build_args();
        assert_eq!(mapped(&args), vec!["[v]", "1:a"]);
        let graph_idx = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert!(args[graph_idx + 1].contains("subtitles="));
    }

    #[test]
    fn test_music_mixes_under_narration() {
        let mut req = base();
        req.narration = Some(PathBuf::from("voice.mp3"));
        req.music = Some(PathBuf::from("music.mp3"));
        let args = req.build_command().build_args();
        assert_eq!(mapped(&args), vec!["[v]", "[a]"]);
        let graph_idx = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert!(args[graph_idx + 1].contains("[1:a]volume=1.0"));
        assert!(args[graph_idx + 1].contains("[2:a]volume=0.10"));
        assert!(args.contains(&"-stream_loop".to_string()));
    }

    #[test]
    fn test_source_audio_without_narration() {
        let args = base().build_command().build_args();
        assert_eq!(mapped(&args), vec!["[v]", "0:a?"]);
        assert!(args.contains(&"+faststart".to_string()));
        assert!(args.contains(&"320k".to_string()));
    }

    #[tokio::test]
    async fn test_render_missing_video() {
        let err = render(&base(), 5, |_| {}).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
