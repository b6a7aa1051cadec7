//! Progress tracking for polling callers.
//!
//! Stages never touch the store directly. They send [`TrackerMessage`]s
//! through a [`ProgressSender`]; one consumer task folds them into the
//! record map, and an independent sweeper task keeps stale records alive
//! (see [`sweeper`]).

mod artifact_probe;
mod diagnostics;
mod sweeper;

pub use artifact_probe::ArtifactLocator;
pub use diagnostics::DiagnosticLog;
pub use sweeper::SweepSummary;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

use vshort_models::{ProgressRecord, ProgressUpdate, SessionKey, Stage};

use crate::config::TrackerConfig;

/// Message from a stage to the tracker.
#[derive(Debug, Clone)]
pub enum TrackerMessage {
    /// Replace the session's record.
    Update(ProgressUpdate),
    /// Map the session to its deliverable.
    RegisterArtifact { key: SessionKey, path: PathBuf },
}

struct TrackerInner {
    records: RwLock<HashMap<SessionKey, ProgressRecord>>,
    artifacts: RwLock<HashMap<SessionKey, PathBuf>>,
    config: TrackerConfig,
    locator: ArtifactLocator,
    diagnostics: Option<DiagnosticLog>,
}

/// Session-keyed progress store.
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<TrackerInner>,
}

impl ProgressTracker {
    pub fn new(
        config: TrackerConfig,
        locator: ArtifactLocator,
        diagnostics: Option<DiagnosticLog>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                records: RwLock::new(HashMap::new()),
                artifacts: RwLock::new(HashMap::new()),
                config,
                locator,
                diagnostics,
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    pub fn locator(&self) -> &ArtifactLocator {
        &self.inner.locator
    }

    /// Overwrite the session's record, stamped now.
    pub async fn report(&self, update: ProgressUpdate) {
        self.report_at(update, Utc::now()).await;
    }

    /// Overwrite the session's record, stamped at `at`.
    pub async fn report_at(&self, update: ProgressUpdate, at: DateTime<Utc>) {
        if let Some(log) = &self.inner.diagnostics {
            log.append(&update, at).await;
        }

        debug!(
            session = %update.key,
            stage = %update.stage,
            percent = update.percent,
            message = update.message.as_deref().unwrap_or(""),
            "Progress"
        );

        let key = update.key.clone();
        let record = update.into_record(at);
        self.inner.records.write().await.insert(key, record);
    }

    /// Map a session to its deliverable so auto-completion does not have to guess.
    pub async fn register_artifact(&self, key: SessionKey, path: PathBuf) {
        debug!(session = %key, path = %path.display(), "Artifact registered");
        self.inner.artifacts.write().await.insert(key, path);
    }

    /// Apply one channel message.
    pub async fn apply(&self, message: TrackerMessage) {
        match message {
            TrackerMessage::Update(update) => self.report(update).await,
            TrackerMessage::RegisterArtifact { key, path } => {
                self.register_artifact(key, path).await
            }
        }
    }

    /// Current record for a session, or the default record if none exists.
    ///
    /// A record parked at finalizing/100 for longer than the read threshold
    /// is auto-completed here as well as by the sweeper.
    pub async fn read(&self, key: &SessionKey) -> ProgressRecord {
        let record = self.inner.records.read().await.get(key).cloned();
        let Some(record) = record else {
            return ProgressRecord::default();
        };

        let threshold = self.inner.config.read_complete_after.as_secs() as i64;
        if awaiting_completion(&record) && record.idle_secs(Utc::now()) > threshold {
            if let Some(completed) = self.auto_complete(key, record.last_updated).await {
                return completed;
            }
        }
        record
    }

    /// Normalize a raw identifier and read its record.
    pub async fn poll(&self, raw: &str) -> ProgressRecord {
        self.read(&SessionKey::normalize(raw)).await
    }

    /// Number of live records.
    pub async fn len(&self) -> usize {
        self.inner.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Start the consumer task and return the sending half of its channel.
    ///
    /// The task ends once every sender is dropped.
    pub fn spawn_consumer(&self) -> ProgressSender {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tracker = self.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                tracker.apply(message).await;
            }
            debug!("Progress channel closed");
        });
        ProgressSender { tx }
    }

    /// Start the periodic sweeper.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let tracker = self.clone();
        let every = self.inner.config.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                tracker.sweep(Utc::now()).await;
            }
        })
    }

    /// Promote a finalizing/100 record to complete with a resolved artifact.
    ///
    /// Does nothing if no artifact can be found or the record changed while
    /// the output store was being probed.
    async fn auto_complete(
        &self,
        key: &SessionKey,
        seen_at: DateTime<Utc>,
    ) -> Option<ProgressRecord> {
        let mapped = self.inner.artifacts.read().await.get(key).cloned();
        let path = match mapped {
            Some(path) => path,
            None => self.inner.locator.latest_artifact().await?,
        };
        let links = self.inner.locator.links_for(&path);

        let mut records = self.inner.records.write().await;
        let record = records.get_mut(key)?;
        if record.last_updated != seen_at || !awaiting_completion(record) {
            return None;
        }

        if !record.has_error() {
            record.message = Some("Processing complete".to_string());
        }
        record.stage = Stage::Complete;
        record.percent = 100;
        record.artifact = Some(links);
        debug!(session = %key, path = %path.display(), "Auto-completed session");
        Some(record.clone())
    }
}

/// Finalizing at 100% without a recorded failure.
fn awaiting_completion(record: &ProgressRecord) -> bool {
    record.stage == Stage::Finalizing && record.percent == 100 && !record.is_failed()
}

/// Sending half of the tracker channel, handed to stages.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<TrackerMessage>,
}

impl ProgressSender {
    /// Sender whose messages go to an explicit receiver.
    pub fn from_channel(tx: mpsc::UnboundedSender<TrackerMessage>) -> Self {
        Self { tx }
    }

    pub fn send(&self, message: TrackerMessage) {
        if self.tx.send(message).is_err() {
            debug!("Progress consumer gone, dropping message");
        }
    }

    pub fn report(&self, update: ProgressUpdate) {
        self.send(TrackerMessage::Update(update));
    }

    pub fn register_artifact(&self, key: SessionKey, path: PathBuf) {
        self.send(TrackerMessage::RegisterArtifact { key, path });
    }

    /// Reporter bound to one session and stage.
    pub fn stage(&self, key: &SessionKey, stage: Stage) -> StageReporter {
        StageReporter {
            sender: self.clone(),
            key: key.clone(),
            stage,
        }
    }
}

/// Maps a stage's own 0-100 progress into its share of the overall scale.
#[derive(Debug, Clone)]
pub struct StageReporter {
    sender: ProgressSender,
    key: SessionKey,
    stage: Stage,
}

impl StageReporter {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Report stage-local progress (0-100).
    pub fn report(&self, local_percent: f64, message: impl Into<String>) {
        self.sender.report(ProgressUpdate::new(
            self.key.clone(),
            self.stage,
            self.stage.scale_percent(local_percent),
            message,
        ));
    }
}
