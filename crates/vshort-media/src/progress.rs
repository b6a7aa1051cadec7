//! FFmpeg and yt-dlp progress parsing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Calculate progress percentage given total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0)
    }
}

/// Parse a progress line from FFmpeg's `-progress` output.
///
/// Fields accumulate into `current`; a snapshot is returned on each
/// `progress=` line, which closes one report block.
pub(crate) fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        "out_time_ms" | "out_time_us" => {
            // Despite the name, ffmpeg reports out_time_ms in microseconds
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "fps" => {
            if let Ok(fps) = value.parse() {
                current.fps = fps;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

/// Whether a stderr line belongs to the `-progress` key/value stream.
pub(crate) fn is_progress_line(line: &str) -> bool {
    match line.split_once('=') {
        Some((key, _)) => !key.is_empty() && !key.contains(' '),
        None => false,
    }
}

static YTDLP_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[download\]\s+(\d{1,3}(?:\.\d+)?)%").unwrap());

/// Parse a `[download]  42.3% of ...` line from yt-dlp.
pub fn parse_ytdlp_percent(line: &str) -> Option<f64> {
    let caps = YTDLP_PERCENT.captures(line)?;
    let percent: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(percent.clamp(0.0, 100.0))
}
