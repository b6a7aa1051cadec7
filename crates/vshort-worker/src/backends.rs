//! Backend seams.
//!
//! Stages talk to the outside world only through these traits so the
//! pipeline can be driven end to end with in-memory fakes. The production
//! adapters wrap `vshort-media` (yt-dlp, ffmpeg, ffprobe) and `vshort-ai`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use vshort_ai::{ChatClient, TtsClient, WhisperClient};
use vshort_media::{
    AudioFormat, ComposeRequest, DownloadProfile, DownloadRequest, FfmpegProgress, MediaResult,
    RepairMode,
};
use vshort_models::{MediaInfo, Transcript};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};

/// Progress callback receiving a 0-100 value.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Fetches source media.
#[async_trait]
pub trait DownloadBackend: Send + Sync {
    /// Download the request window with one quality profile.
    async fn fetch(
        &self,
        request: &DownloadRequest,
        profile: DownloadProfile,
        timeout: Duration,
        progress: ProgressFn,
    ) -> MediaResult<()>;

    /// Resolve a direct media URL for a raw transfer.
    async fn resolve_direct_url(&self, url: &str, timeout: Duration) -> MediaResult<String>;

    /// Stream `url` to `output`; returns bytes written.
    async fn transfer(&self, url: &str, output: &Path, progress: ProgressFn) -> MediaResult<u64>;
}

/// Local media processing and probing.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;

    async fn duration(&self, path: &Path) -> MediaResult<f64>;

    /// Exists, is large enough and exposes a decodable video stream.
    async fn is_valid(&self, path: &Path) -> bool;

    async fn extract_audio(&self, input: &Path, output: &Path, format: AudioFormat) -> MediaResult<()>;

    /// Cut `[start, start + duration)` with exact timestamps.
    async fn trim(&self, input: &Path, output: &Path, start: f64, duration: f64) -> MediaResult<()>;

    async fn concat(&self, inputs: &[PathBuf], list_path: &Path, output: &Path) -> MediaResult<()>;

    async fn render(&self, request: &ComposeRequest, progress: ProgressFn) -> MediaResult<()>;

    async fn repair(&self, input: &Path, output: &Path, mode: RepairMode) -> MediaResult<()>;

    async fn placeholder_video(&self, output: &Path, duration: f64) -> MediaResult<()>;
}

/// Speech recognition.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &Path, mime_type: &str, language: &str) -> WorkerResult<Transcript>;
}

/// Text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> WorkerResult<String>;
}

/// Speech synthesis.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str, output: &Path) -> WorkerResult<u64>;
}

/// Every backend a pipeline needs.
#[derive(Clone)]
pub struct Backends {
    pub download: Arc<dyn DownloadBackend>,
    pub media: Arc<dyn MediaBackend>,
    pub stt: Arc<dyn SpeechToText>,
    pub text: Arc<dyn TextGenerator>,
    pub tts: Arc<dyn TextToSpeech>,
}

impl Backends {
    /// Production backends configured from the environment.
    ///
    /// Missing API keys fail here rather than mid-run.
    pub fn from_env(config: &PipelineConfig) -> WorkerResult<Self> {
        vshort_media::check_ffmpeg()?;
        vshort_media::check_ffprobe()?;
        vshort_media::check_ytdlp()?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WorkerError::config_error(format!("HTTP client: {}", e)))?;

        Ok(Self {
            download: Arc::new(YtDlpDownloader::new(http)),
            media: Arc::new(FfmpegMedia::new(
                config.ffmpeg_timeout_secs,
                config.render_timeout_secs,
            )),
            stt: Arc::new(WhisperClient::from_env()?),
            text: Arc::new(ChatClient::from_env()?),
            tts: Arc::new(TtsClient::from_env()?),
        })
    }
}

/// yt-dlp plus a plain HTTP client for raw transfers.
pub struct YtDlpDownloader {
    http: reqwest::Client,
}

impl YtDlpDownloader {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DownloadBackend for YtDlpDownloader {
    async fn fetch(
        &self,
        request: &DownloadRequest,
        profile: DownloadProfile,
        timeout: Duration,
        progress: ProgressFn,
    ) -> MediaResult<()> {
        vshort_media::download_with_profile(request, profile, timeout, move |p| progress(p)).await
    }

    async fn resolve_direct_url(&self, url: &str, timeout: Duration) -> MediaResult<String> {
        vshort_media::resolve_direct_url(url, timeout).await
    }

    async fn transfer(&self, url: &str, output: &Path, progress: ProgressFn) -> MediaResult<u64> {
        vshort_media::transfer_bytes(&self.http, url, output, |p| progress(p)).await
    }
}

/// ffmpeg/ffprobe with per-call budgets.
pub struct FfmpegMedia {
    timeout_secs: u64,
    render_timeout_secs: u64,
}

impl FfmpegMedia {
    pub fn new(timeout_secs: u64, render_timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            render_timeout_secs,
        }
    }
}

#[async_trait]
impl MediaBackend for FfmpegMedia {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        vshort_media::probe_media(path).await
    }

    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        vshort_media::get_duration(path).await
    }

    async fn is_valid(&self, path: &Path) -> bool {
        vshort_media::is_video_valid(path).await
    }

    async fn extract_audio(&self, input: &Path, output: &Path, format: AudioFormat) -> MediaResult<()> {
        vshort_media::extract_audio(input, output, format, self.timeout_secs).await
    }

    async fn trim(&self, input: &Path, output: &Path, start: f64, duration: f64) -> MediaResult<()> {
        vshort_media::extract_segment(input, output, start, duration, false, self.timeout_secs).await
    }

    async fn concat(&self, inputs: &[PathBuf], list_path: &Path, output: &Path) -> MediaResult<()> {
        vshort_media::concat_segments(inputs, list_path, output, self.timeout_secs).await
    }

    async fn render(&self, request: &ComposeRequest, progress: ProgressFn) -> MediaResult<()> {
        // Percent needs the clip length; without it progress is not reported
        let total_ms = vshort_media::get_duration(&request.video)
            .await
            .map(|d| (d * 1000.0) as i64)
            .unwrap_or(0);

        vshort_media::render(request, self.render_timeout_secs, move |p: FfmpegProgress| {
            if total_ms > 0 {
                progress(p.percentage(total_ms));
            }
        })
        .await
    }

    async fn repair(&self, input: &Path, output: &Path, mode: RepairMode) -> MediaResult<()> {
        vshort_media::repair_video(input, output, mode, self.timeout_secs).await
    }

    async fn placeholder_video(&self, output: &Path, duration: f64) -> MediaResult<()> {
        vshort_media::generate_placeholder_video(output, duration, self.timeout_secs).await
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    async fn transcribe(&self, audio: &Path, mime_type: &str, language: &str) -> WorkerResult<Transcript> {
        Ok(WhisperClient::transcribe(self, audio, mime_type, language).await?)
    }
}

/// Sampling temperature for script rewrites.
const SCRIPT_TEMPERATURE: f32 = 0.5;

#[async_trait]
impl TextGenerator for ChatClient {
    async fn generate(&self, system: &str, prompt: &str) -> WorkerResult<String> {
        Ok(self.complete(system, prompt, SCRIPT_TEMPERATURE, None).await?)
    }
}

#[async_trait]
impl TextToSpeech for TtsClient {
    async fn synthesize(&self, text: &str, voice_id: &str, output: &Path) -> WorkerResult<u64> {
        Ok(TtsClient::synthesize(self, text, voice_id, output).await?)
    }
}
