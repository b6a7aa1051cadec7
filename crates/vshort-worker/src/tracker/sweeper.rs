//! Staleness watchdog.
//!
//! One pass applies at most one rule per record, in this order:
//! purge after long idle, leave finished or failed records alone,
//! auto-complete a parked finalizing/100 record, promote a stuck download,
//! and finally add an estimated increment to anything idle, capped at the
//! top of the record's stage band. Only genuine reports move
//! `last_updated`, so a sweep never hides a fresher update.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use vshort_models::{SessionKey, Stage};

use super::{awaiting_completion, ProgressTracker};

/// Percent a stuck download is promoted to.
const RECOVERY_PERCENT: u8 = 20;

/// What one sweep did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    pub purged: usize,
    pub estimated: usize,
    pub promoted: usize,
    pub completed: usize,
}

impl ProgressTracker {
    /// Run one watchdog pass as of `now`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepSummary {
        let config = &self.inner.config;
        let purge_after = config.purge_after.as_secs() as i64;
        let complete_after = config.auto_complete_after.as_secs() as i64;
        let stall_after = config.download_stall.as_secs() as i64;
        let stale_after = config.stale_after.as_secs() as i64;

        let mut summary = SweepSummary::default();
        let mut completion_candidates: Vec<(SessionKey, DateTime<Utc>)> = Vec::new();

        {
            let mut records = self.inner.records.write().await;
            let mut purged: Vec<SessionKey> = Vec::new();

            for (key, record) in records.iter_mut() {
                let idle = record.idle_secs(now);

                if idle > purge_after {
                    purged.push(key.clone());
                    continue;
                }
                if record.stage == Stage::Complete || record.is_failed() {
                    continue;
                }
                if awaiting_completion(record) {
                    if idle > complete_after {
                        completion_candidates.push((key.clone(), record.last_updated));
                    }
                    continue;
                }
                if record.stage == Stage::Downloading && idle > stall_after {
                    warn!(session = %key, idle_secs = idle, "Download stalled, forcing transcription stage");
                    record.stage = Stage::Transcribing;
                    record.percent = record.percent.max(RECOVERY_PERCENT);
                    record.message = Some("Starting transcription (recovery mode)".to_string());
                    summary.promoted += 1;
                    continue;
                }
                // Estimates stay inside the stage's band so the next real report
                // never moves the bar backwards
                let cap = config.estimate_cap.min(record.stage.percent_range().1);
                if idle > stale_after && record.percent < cap {
                    record.percent = record
                        .percent
                        .saturating_add(config.estimate_step)
                        .min(cap);
                    record.message = Some(format!("{} in progress (estimated)", record.stage));
                    summary.estimated += 1;
                }
            }

            for key in &purged {
                records.remove(key);
            }
            summary.purged = purged.len();

            if !purged.is_empty() {
                let mut artifacts = self.inner.artifacts.write().await;
                for key in &purged {
                    artifacts.remove(key);
                }
            }
        }

        // Probing the output store happens outside the record lock
        for (key, seen_at) in completion_candidates {
            if self.auto_complete(&key, seen_at).await.is_some() {
                summary.completed += 1;
            }
        }

        if summary != SweepSummary::default() {
            info!(
                purged = summary.purged,
                estimated = summary.estimated,
                promoted = summary.promoted,
                completed = summary.completed,
                "Progress sweep"
            );
        } else {
            debug!("Progress sweep: nothing to do");
        }

        summary
    }
}
