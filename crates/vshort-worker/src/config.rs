//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use vshort_models::PipelineOptions;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(env_or(key, default))
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Parent of per-session working directories
    pub work_dir: PathBuf,
    /// Where deliverables are copied
    pub output_dir: PathBuf,
    /// Append-only progress log; `None` disables it
    pub diagnostic_log: Option<PathBuf>,
    /// Prefix for artifact stream/download links
    pub public_base: String,
    /// Default target clip length in seconds
    pub target_duration: f64,
    /// Default length of the downloaded window in seconds
    pub download_window: f64,
    /// Default desired source height
    pub min_height: u32,
    /// Heights below this fail the ultra tier
    pub hd_threshold: u32,
    /// Ultra tier budget
    pub ultra_timeout: Duration,
    /// HD tier budget
    pub hd_timeout: Duration,
    /// Direct transfer budget (resolve + transfer + trim)
    pub direct_timeout: Duration,
    /// Transfer attempts in the direct tier
    pub direct_attempts: u32,
    /// Silence before synthetic download progress kicks in
    pub silent_progress_after: Duration,
    /// Wall-clock budget of the whole transcription stage
    pub transcribe_budget: Duration,
    /// Submissions in the transcription retry loop
    pub transcribe_attempts: u32,
    /// Base of the `base * 2^n` transcription backoff
    pub transcribe_backoff: Duration,
    /// Lower bound of the script word band
    pub script_min_words: usize,
    /// Upper bound of the script word band
    pub script_max_words: usize,
    /// Voice used when a session does not pick one
    pub default_voice: String,
    /// Text-to-speech attempts
    pub tts_attempts: u32,
    /// Directory holding named background music tracks
    pub music_dir: PathBuf,
    /// Relative weight of background music in the mix
    pub music_volume: f64,
    /// Budget for each ffmpeg invocation except the final render
    pub ffmpeg_timeout_secs: u64,
    /// Budget for the final render
    pub render_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/vshort"),
            output_dir: PathBuf::from("./output"),
            diagnostic_log: Some(PathBuf::from("./logs/progress.jsonl")),
            public_base: "/api/video".to_string(),
            target_duration: 85.0,
            download_window: 180.0,
            min_height: 1080,
            hd_threshold: 720,
            ultra_timeout: Duration::from_secs(300),
            hd_timeout: Duration::from_secs(240),
            direct_timeout: Duration::from_secs(300),
            direct_attempts: 3,
            silent_progress_after: Duration::from_secs(8),
            transcribe_budget: Duration::from_secs(300),
            transcribe_attempts: 3,
            transcribe_backoff: Duration::from_secs(2),
            script_min_words: 200,
            script_max_words: 250,
            default_voice: vshort_ai::DEFAULT_VOICE_ID.to_string(),
            tts_attempts: 2,
            music_dir: PathBuf::from("./assets/music"),
            music_volume: 0.1,
            ffmpeg_timeout_secs: 600,
            render_timeout_secs: 1800,
        }
    }
}

impl PipelineConfig {
    /// Session options seeded with the configured defaults.
    pub fn default_options(&self) -> PipelineOptions {
        PipelineOptions {
            target_duration: self.target_duration,
            max_window: self.download_window,
            min_height: self.min_height,
            ..PipelineOptions::default()
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("VSHORT_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("VSHORT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            diagnostic_log: match std::env::var("VSHORT_DIAGNOSTIC_LOG") {
                Ok(v) if v.is_empty() || v == "off" => None,
                Ok(v) => Some(PathBuf::from(v)),
                Err(_) => defaults.diagnostic_log,
            },
            public_base: std::env::var("VSHORT_PUBLIC_BASE").unwrap_or(defaults.public_base),
            target_duration: env_or("VSHORT_TARGET_DURATION", defaults.target_duration),
            download_window: env_or("VSHORT_DOWNLOAD_WINDOW", defaults.download_window),
            min_height: env_or("VSHORT_MIN_HEIGHT", defaults.min_height),
            hd_threshold: env_or("VSHORT_HD_THRESHOLD", defaults.hd_threshold),
            ultra_timeout: env_secs("VSHORT_ULTRA_TIMEOUT", 300),
            hd_timeout: env_secs("VSHORT_HD_TIMEOUT", 240),
            direct_timeout: env_secs("VSHORT_DIRECT_TIMEOUT", 300),
            direct_attempts: env_or("VSHORT_DIRECT_ATTEMPTS", defaults.direct_attempts),
            silent_progress_after: defaults.silent_progress_after,
            transcribe_budget: env_secs("VSHORT_TRANSCRIBE_BUDGET", 300),
            transcribe_attempts: env_or("VSHORT_TRANSCRIBE_ATTEMPTS", defaults.transcribe_attempts),
            transcribe_backoff: defaults.transcribe_backoff,
            script_min_words: env_or("VSHORT_SCRIPT_MIN_WORDS", defaults.script_min_words),
            script_max_words: env_or("VSHORT_SCRIPT_MAX_WORDS", defaults.script_max_words),
            default_voice: std::env::var("VSHORT_DEFAULT_VOICE").unwrap_or(defaults.default_voice),
            tts_attempts: env_or("VSHORT_TTS_ATTEMPTS", defaults.tts_attempts),
            music_dir: std::env::var("VSHORT_MUSIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.music_dir),
            music_volume: env_or("VSHORT_MUSIC_VOLUME", defaults.music_volume),
            ffmpeg_timeout_secs: env_or("VSHORT_FFMPEG_TIMEOUT", defaults.ffmpeg_timeout_secs),
            render_timeout_secs: env_or("VSHORT_RENDER_TIMEOUT", defaults.render_timeout_secs),
        }
    }
}

/// Progress tracker timings.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// How often the sweeper runs
    pub sweep_interval: Duration,
    /// Idle time before an estimated increment
    pub stale_after: Duration,
    /// Idle time before a stuck download is promoted
    pub download_stall: Duration,
    /// Idle time before finalizing/100 is auto-completed by the sweeper
    pub auto_complete_after: Duration,
    /// Idle time before finalizing/100 is auto-completed on read
    pub read_complete_after: Duration,
    /// Idle time before a record is dropped
    pub purge_after: Duration,
    /// Percent added per estimated increment
    pub estimate_step: u8,
    /// Estimated increments never go past this
    pub estimate_cap: u8,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(15),
            stale_after: Duration::from_secs(30),
            download_stall: Duration::from_secs(180),
            auto_complete_after: Duration::from_secs(120),
            read_complete_after: Duration::from_secs(300),
            purge_after: Duration::from_secs(3600),
            estimate_step: 10,
            estimate_cap: 95,
        }
    }
}

impl TrackerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sweep_interval: env_secs("VSHORT_SWEEP_INTERVAL", 15),
            purge_after: env_secs("VSHORT_PURGE_AFTER", 3600),
            ..defaults
        }
    }
}
