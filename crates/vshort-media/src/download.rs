//! Source acquisition using yt-dlp and plain HTTP.
//!
//! Two yt-dlp profiles cover the quality tiers; `resolve_direct_url` and
//! `transfer_bytes` implement the raw-transfer tier.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::check_ytdlp;
use crate::error::{MediaError, MediaResult};
use crate::progress::parse_ytdlp_percent;

/// User agent presented by yt-dlp and raw transfers.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// yt-dlp format selection profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadProfile {
    /// >=1440p, 60 fps, h264/aac preferred, parallel fragments
    Ultra,
    /// Capped at 1080p, single-threaded
    Hd,
}

impl DownloadProfile {
    pub fn name(&self) -> &'static str {
        match self {
            DownloadProfile::Ultra => "ultra",
            DownloadProfile::Hd => "hd",
        }
    }

    /// yt-dlp `-f` selector.
    pub fn format_selector(&self) -> &'static str {
        match self {
            DownloadProfile::Ultra => concat!(
                "bestvideo[height>=1440][fps>=60][vcodec^=avc1]+bestaudio[acodec^=mp4a]/",
                "bestvideo[height>=1440][vcodec^=avc1]+bestaudio[ext=m4a]/",
                "bestvideo[height>=1080]+bestaudio/",
                "best[height>=1080]"
            ),
            DownloadProfile::Hd => concat!(
                "bestvideo[height<=1080][ext=mp4]+bestaudio[ext=m4a]/",
                "best[height<=1080][ext=mp4]/",
                "best[height<=1080]/best"
            ),
        }
    }

    fn concurrent_fragments(&self) -> u32 {
        match self {
            DownloadProfile::Ultra => 8,
            DownloadProfile::Hd => 1,
        }
    }
}

/// What to fetch and where to put it.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    /// Window start in seconds
    pub start_offset: f64,
    /// Window length in seconds
    pub max_window: f64,
    pub output: PathBuf,
}

impl DownloadRequest {
    /// `--download-sections` argument for the requested window.
    pub fn section_arg(&self) -> String {
        format!(
            "*{:.0}-{:.0}",
            self.start_offset,
            self.start_offset + self.max_window
        )
    }

    /// Build the yt-dlp arguments for a profile.
    pub fn build_args(&self, profile: DownloadProfile) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--no-playlist".into(),
            "--no-part".into(),
            "--user-agent".into(),
            USER_AGENT.into(),
            "--concurrent-fragments".into(),
            profile.concurrent_fragments().to_string(),
            "--download-sections".into(),
            self.section_arg(),
            "-f".into(),
            profile.format_selector().into(),
            "--merge-output-format".into(),
            "mp4".into(),
        ];

        if profile == DownloadProfile::Ultra {
            args.push("-S".into());
            args.push("res,fps,vcodec:h264,acodec:aac".into());
        }

        args.push("-o".into());
        args.push(self.output.to_string_lossy().to_string());
        args.push(self.url.clone());
        args
    }
}

/// Detect rate limiting in tool or server output.
pub fn is_rate_limited(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("429")
        || lower.contains("too many requests")
        || lower.contains("rate limit")
        || lower.contains("sign in to confirm")
}

/// Download the request window with yt-dlp using one profile.
///
/// `on_progress` receives the tool's own percent markers (0-100).
pub async fn download_with_profile<F>(
    request: &DownloadRequest,
    profile: DownloadProfile,
    timeout: Duration,
    on_progress: F,
) -> MediaResult<()>
where
    F: Fn(f64) + Send + 'static,
{
    check_ytdlp()?;

    let args = request.build_args(profile);
    info!(
        url = %request.url,
        profile = profile.name(),
        section = %request.section_arg(),
        output = %request.output.display(),
        "Downloading source with yt-dlp"
    );
    debug!("Running yt-dlp {}", args.join(" "));

    let mut child = Command::new("yt-dlp")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| MediaError::internal("yt-dlp stdout not captured"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| MediaError::internal("yt-dlp stderr not captured"))?;

    let progress_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(percent) = parse_ytdlp_percent(&line) {
                on_progress(percent);
            }
        }
    });
    let stderr_handle = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    });

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            warn!(profile = profile.name(), "yt-dlp timed out, killing process");
            let _ = child.kill().await;
            return Err(MediaError::Timeout(timeout.as_secs()));
        }
    };

    let _ = progress_handle.await;
    let stderr = stderr_handle.await.unwrap_or_default();

    if !status.success() {
        let error_msg = stderr.lines().last().unwrap_or("Unknown error");
        if is_rate_limited(&stderr) {
            warn!(url = %request.url, "Rate limit detected during download");
        }
        return Err(MediaError::download_failed(format!(
            "yt-dlp {} failed: {}",
            profile.name(),
            error_msg
        )));
    }

    ensure_output(&request.output).await
}

/// Resolve a direct media URL with `yt-dlp -g`.
pub async fn resolve_direct_url(url: &str, timeout: Duration) -> MediaResult<String> {
    check_ytdlp()?;

    let output = tokio::time::timeout(
        timeout,
        Command::new("yt-dlp")
            .args(["-g", "--no-playlist", "-f", "best[ext=mp4]/best", url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| MediaError::Timeout(timeout.as_secs()))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::download_failed(format!(
            "Could not resolve direct URL: {}",
            stderr.lines().last().unwrap_or("Unknown error")
        )));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("http"))
        .map(str::to_string)
        .ok_or_else(|| MediaError::download_failed("yt-dlp returned no direct URL"))
}

/// Stream a URL to disk, reporting percent when the length is known.
///
/// Returns the number of bytes written.
pub async fn transfer_bytes<F>(
    client: &reqwest::Client,
    url: &str,
    output: &Path,
    on_progress: F,
) -> MediaResult<u64>
where
    F: Fn(f64),
{
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(MediaError::download_failed(format!(
            "Direct transfer returned HTTP {}",
            status.as_u16()
        )));
    }

    let total = response.content_length();
    let mut file = tokio::fs::File::create(output).await?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        if let Some(total) = total.filter(|t| *t > 0) {
            on_progress((written as f64 / total as f64 * 100.0).min(100.0));
        }
    }
    file.flush().await?;

    if written == 0 {
        return Err(MediaError::download_failed("Direct transfer returned no data"));
    }

    info!(
        output = %output.display(),
        size_mb = written as f64 / (1024.0 * 1024.0),
        "Direct transfer complete"
    );
    Ok(written)
}

async fn ensure_output(path: &Path) -> MediaResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => {
            info!(
                output = %path.display(),
                size_mb = meta.len() as f64 / (1024.0 * 1024.0),
                "Downloaded source successfully"
            );
            Ok(())
        }
        _ => Err(MediaError::download_failed("Output file not created")),
    }
}
