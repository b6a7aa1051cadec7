//! Source acquisition through an ordered quality-fallback chain.
//!
//! Tiers: ultra (constrained high-quality selection, parallel fragments,
//! probed against the HD threshold), hd (single-threaded, capped at
//! 1080p), direct (resolved URL plus raw transfer with retries, trimmed to
//! the window). When every tier fails a placeholder clip is generated so
//! the rest of the pipeline can run in degraded mode; only a failing
//! placeholder ends the session.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use vshort_media::{DownloadProfile, DownloadRequest, MediaError};
use vshort_models::{ArtifactKind, MediaArtifact, MediaInfo, Stage};

use crate::backends::ProgressFn;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{retry, RetryResult};
use crate::stages::StageContext;
use crate::strategy::{Strategy, StrategyOutcome, StrategyRunner};
use crate::tracker::StageReporter;

/// Synthetic increment applied when the download tool goes quiet.
const SILENT_STEP: f64 = 5.0;
/// Synthetic progress never goes past this.
const SILENT_CAP: f64 = 90.0;

/// Acquired source media.
#[derive(Debug, Clone)]
pub struct AcquiredMedia {
    pub artifact: MediaArtifact,
    pub info: MediaInfo,
    /// Name of the tier that produced it (`placeholder` when none did)
    pub tier: &'static str,
    /// Set when the pipeline continues without real source media
    pub degraded: Option<String>,
}

struct MonitorState {
    percent: f64,
    last_marker: Instant,
}

/// Shared, monotonic download progress across tiers.
#[derive(Clone)]
struct TierMonitor {
    reporter: StageReporter,
    state: Arc<Mutex<MonitorState>>,
}

impl TierMonitor {
    fn new(reporter: StageReporter) -> Self {
        Self {
            reporter,
            state: Arc::new(Mutex::new(MonitorState {
                percent: 0.0,
                last_marker: Instant::now(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Callback fed with the tool's own percent markers.
    fn callback(&self, tier: &'static str) -> ProgressFn {
        let monitor = self.clone();
        Arc::new(move |percent: f64| monitor.marker(tier, percent))
    }

    fn marker(&self, tier: &'static str, percent: f64) {
        let advanced = {
            let mut state = self.lock();
            state.last_marker = Instant::now();
            if percent > state.percent {
                state.percent = percent.min(100.0);
                Some(state.percent)
            } else {
                None
            }
        };
        if let Some(p) = advanced {
            self.reporter
                .report(p, format!("Downloading video ({}): {:.0}%", tier, p));
        }
    }

    /// Background ticker adding synthetic progress while the tool is silent.
    fn spawn_silence_ticker(&self, tier: &'static str, silent_after: Duration) -> TickerGuard {
        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(silent_after);
            interval.tick().await;
            loop {
                interval.tick().await;
                let bumped = {
                    let mut state = monitor.lock();
                    if state.last_marker.elapsed() < silent_after || state.percent >= SILENT_CAP {
                        None
                    } else {
                        state.percent = (state.percent + SILENT_STEP).min(SILENT_CAP);
                        state.last_marker = Instant::now();
                        Some(state.percent)
                    }
                };
                if let Some(p) = bumped {
                    monitor
                        .reporter
                        .report(p, format!("Downloading video ({})...", tier));
                }
            }
        });
        TickerGuard(handle)
    }
}

/// Stops the silence ticker when the tier ends.
struct TickerGuard(JoinHandle<()>);

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn download_request(ctx: &StageContext, output: PathBuf) -> DownloadRequest {
    DownloadRequest {
        url: ctx.session.source_url.clone(),
        start_offset: ctx.session.options.start_offset,
        max_window: ctx.session.options.max_window,
        output,
    }
}

async fn fetch_tier(
    ctx: &StageContext,
    monitor: &TierMonitor,
    profile: DownloadProfile,
    timeout: Duration,
    min_height: Option<u32>,
) -> WorkerResult<(MediaArtifact, MediaInfo)> {
    let tier = profile.name();
    let output = ctx.work_path(&format!("source_{}.mp4", tier));
    let request = download_request(ctx, output.clone());

    let _ticker = monitor.spawn_silence_ticker(tier, ctx.config.silent_progress_after);
    ctx.backends
        .download
        .fetch(&request, profile, timeout, monitor.callback(tier))
        .await?;

    let info = ctx.backends.media.probe(&output).await?;
    if let Some(threshold) = min_height {
        if !info.meets_height(threshold) {
            return Err(MediaError::QualityTooLow {
                height: info.height,
                threshold,
            }
            .into());
        }
    }
    Ok((MediaArtifact::new(output, ArtifactKind::Raw).validated(), info))
}

async fn direct_tier(
    ctx: &StageContext,
    monitor: &TierMonitor,
    timeout: Duration,
) -> WorkerResult<(MediaArtifact, MediaInfo)> {
    const TIER: &str = "direct";
    let _ticker = monitor.spawn_silence_ticker(TIER, ctx.config.silent_progress_after);

    let direct_url = ctx
        .backends
        .download
        .resolve_direct_url(&ctx.session.source_url, timeout)
        .await?;

    let full = ctx.work_path("source_direct_full.mp4");
    let progress = monitor.callback(TIER);
    let transferred = retry(
        "direct_transfer",
        |_| {
            ctx.backends
                .download
                .transfer(&direct_url, &full, progress.clone())
        },
        |_| true,
        ctx.config.direct_attempts,
        |n| Duration::from_secs(1).saturating_mul(2u32.saturating_pow(n)),
    )
    .await;
    let bytes = match transferred {
        RetryResult::Success(bytes) => bytes,
        RetryResult::Failed { error, attempts } => {
            warn!(attempts, "Direct transfer failed: {}", error);
            return Err(error.into());
        }
    };
    info!(bytes, "Direct transfer complete, trimming to window");

    let output = ctx.work_path("source_direct.mp4");
    let options = &ctx.session.options;
    ctx.backends
        .media
        .trim(&full, &output, options.start_offset, options.max_window)
        .await?;

    let info = ctx.backends.media.probe(&output).await?;
    Ok((MediaArtifact::new(output, ArtifactKind::Raw).validated(), info))
}

/// Acquire source media for the session.
///
/// Fails only when even the placeholder cannot be produced.
pub async fn acquire(ctx: &StageContext) -> WorkerResult<AcquiredMedia> {
    let reporter = ctx.reporter(Stage::Downloading);
    reporter.report(0.0, "Downloading video...");
    let monitor = TierMonitor::new(reporter.clone());
    let config = &ctx.config;

    if ctx.session.options.min_height > config.hd_threshold {
        info!(
            desired = ctx.session.options.min_height,
            threshold = config.hd_threshold,
            "Ultra tier accepts anything at or above the HD threshold"
        );
    }

    let strategies = vec![
        Strategy::new("ultra", config.ultra_timeout, || {
            fetch_tier(
                ctx,
                &monitor,
                DownloadProfile::Ultra,
                config.ultra_timeout,
                Some(config.hd_threshold),
            )
            .boxed()
        }),
        Strategy::new("hd", config.hd_timeout, || {
            fetch_tier(ctx, &monitor, DownloadProfile::Hd, config.hd_timeout, None).boxed()
        }),
        Strategy::new("direct", config.direct_timeout, || {
            direct_tier(ctx, &monitor, config.direct_timeout).boxed()
        }),
    ];

    match StrategyRunner::new("acquisition").run(strategies).await {
        Ok(StrategyOutcome {
            name,
            value: (artifact, info),
            failures,
        }) => {
            if !info.meets_height(ctx.session.options.min_height) {
                ctx.logger.log_warning(
                    Stage::Downloading,
                    &format!(
                        "Source is {}p, below the requested {}p",
                        info.height, ctx.session.options.min_height
                    ),
                );
            }
            // Keep what the better tiers failed with; it ends up in the final message
            let degraded = if failures.is_empty() {
                None
            } else {
                let failed = failures.join("; ");
                ctx.logger.log_warning(
                    Stage::Downloading,
                    &WorkerError::DegradedQuality(failed.clone()).to_string(),
                );
                Some(format!("source quality degraded ({})", failed))
            };
            reporter.report(
                100.0,
                format!("Download complete ({}, {}p)", name, info.height),
            );
            Ok(AcquiredMedia {
                artifact,
                info,
                tier: name,
                degraded,
            })
        }
        Err(e) => placeholder(ctx, &reporter, e).await,
    }
}

async fn placeholder(
    ctx: &StageContext,
    reporter: &StageReporter,
    cause: WorkerError,
) -> WorkerResult<AcquiredMedia> {
    let degraded = format!("download failed ({})", cause);
    ctx.logger.log_error(Stage::Downloading, &degraded);
    metrics::record_placeholder("acquisition");
    reporter.report(
        100.0,
        format!("Error: {}, continuing with placeholder", degraded),
    );

    let output = ctx.work_path("source_placeholder.mp4");
    let duration = ctx.session.options.max_window;
    ctx.backends
        .media
        .placeholder_video(&output, duration)
        .await
        .map_err(|e| WorkerError::fatal_io(format!("no source media and no placeholder: {}", e)))?;

    let info = ctx
        .backends
        .media
        .probe(&output)
        .await
        .map_err(|e| WorkerError::fatal_io(format!("placeholder unreadable: {}", e)))?;

    Ok(AcquiredMedia {
        artifact: MediaArtifact::new(output, ArtifactKind::Raw).validated(),
        info,
        tier: "placeholder",
        degraded: Some(degraded),
    })
}
