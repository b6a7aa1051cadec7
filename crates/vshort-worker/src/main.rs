//! Highlight clip pipeline binary.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vshort_models::{EditingStyle, ProgressRecord, Stage};
use vshort_worker::Pipeline;

/// Turn a long video into a narrated, subtitled highlight clip.
#[derive(Debug, Parser)]
#[command(name = "vshort-worker", version)]
struct Args {
    /// Source video URL (pasted text containing one is fine)
    url: String,

    /// Editing style: minimal, dynamic or dramatic
    #[arg(long, default_value = "dynamic")]
    style: EditingStyle,

    /// Offset into the source where the window starts, in seconds
    #[arg(long, default_value_t = 0.0)]
    start: f64,
}

const POLL_INTERVAL: Duration = Duration::from_secs(2);

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vshort_worker=info,vshort_media=info,vshort_ai=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn same_progress(a: &ProgressRecord, b: &ProgressRecord) -> bool {
    a.stage == b.stage && a.percent == b.percent && a.message == b.message
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let pipeline = Pipeline::from_env().context("failed to build pipeline")?;
    info!("Pipeline config: {:?}", pipeline.config());

    let mut options = pipeline.config().default_options();
    options.editing_style = args.style;
    options.start_offset = args.start;

    let key = pipeline
        .start(&args.url, options)
        .context("failed to start session")?;
    info!(session = %key, "Session started");

    let mut last: Option<ProgressRecord> = None;
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, in-flight tools keep running until their own timeout");
                return Ok(false);
            }
        }

        let record = pipeline.poll(key.as_str()).await;
        if last.as_ref().map_or(true, |l| !same_progress(l, &record)) {
            info!(
                stage = %record.stage,
                percent = record.percent,
                message = record.message.as_deref().unwrap_or(""),
                "Progress"
            );
        }

        if record.stage == Stage::Complete {
            if let Some(artifact) = &record.artifact {
                info!(path = %artifact.path.display(), file = %artifact.file_name, "Clip ready");
            }
            return Ok(true);
        }
        if record.is_failed() {
            return Ok(false);
        }
        last = Some(record);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    info!("Starting vshort-worker");

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
