//! FFprobe media information and validity checks.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use vshort_models::MediaInfo;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Files smaller than this are never considered playable.
pub const MIN_VALID_FILE_SIZE: u64 = 1000;

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

async fn run_ffprobe(path: &Path) -> MediaResult<FfprobeOutput> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}

fn parse_duration(format: Option<&FfprobeFormat>) -> f64 {
    format
        .and_then(|f| f.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Probe a video file for stream metadata.
///
/// Fails with `InvalidVideo` when the file has no video stream.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let probe = run_ffprobe(path.as_ref()).await?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let bitrate = probe
        .format
        .as_ref()
        .and_then(|f| f.bit_rate.as_ref())
        .and_then(|b| b.parse::<u64>().ok());

    let fps = video_stream
        .avg_frame_rate
        .as_ref()
        .and_then(|r| parse_frame_rate(r))
        .or_else(|| video_stream.r_frame_rate.as_ref().and_then(|r| parse_frame_rate(r)))
        .unwrap_or(30.0);

    Ok(MediaInfo {
        duration: parse_duration(probe.format.as_ref()),
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        bitrate,
        has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
    })
}

/// Get media duration in seconds. Works for audio-only files.
pub async fn get_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let probe = run_ffprobe(path.as_ref()).await?;
    let duration = parse_duration(probe.format.as_ref());
    if duration <= 0.0 {
        return Err(MediaError::InvalidVideo(format!(
            "No duration reported for {}",
            path.as_ref().display()
        )));
    }
    Ok(duration)
}

/// Whether ffprobe finds at least one video stream.
pub async fn has_video_stream(path: impl AsRef<Path>) -> MediaResult<bool> {
    let probe = run_ffprobe(path.as_ref()).await?;
    Ok(probe.streams.iter().any(|s| s.codec_type == "video"))
}

/// A file is valid when it exists, is not trivially small, and exposes a
/// decodable video stream. Probe errors count as invalid.
pub async fn is_video_valid(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();

    let size = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(_) => return false,
    };
    if size < MIN_VALID_FILE_SIZE {
        debug!(path = %path.display(), size, "Video too small to be valid");
        return false;
    }

    match has_video_stream(path).await {
        Ok(found) => found,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Video probe failed");
            false
        }
    }
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_ffprobe_output_without_format() {
        let probe: FfprobeOutput =
            serde_json::from_str(r#"{"streams":[{"codec_type":"audio"}]}"#).unwrap();
        assert!(probe.format.is_none());
        assert_eq!(parse_duration(probe.format.as_ref()), 0.0);
    }

    #[tokio::test]
    async fn test_missing_file_is_invalid() {
        assert!(!is_video_valid("/nonexistent/clip.mp4").await);
    }

    #[tokio::test]
    async fn test_tiny_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.mp4");
        tokio::fs::write(&path, b"not a video").await.unwrap();
        assert!(!is_video_valid(&path).await);
    }
}
