//! Append-only JSON-lines log of every progress report.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use vshort_models::{ProgressUpdate, Stage};

use crate::retry::FailureTracker;

#[derive(Debug, Serialize)]
struct DiagnosticEntry<'a> {
    session: &'a str,
    stage: Stage,
    percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    timestamp: DateTime<Utc>,
}

/// Best-effort diagnostic log. Write failures never reach the caller.
#[derive(Debug)]
pub struct DiagnosticLog {
    path: PathBuf,
    failures: Mutex<FailureTracker>,
}

impl DiagnosticLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            failures: Mutex::new(FailureTracker::new(3)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one report.
    pub async fn append(&self, update: &ProgressUpdate, at: DateTime<Utc>) {
        let entry = DiagnosticEntry {
            session: update.key.as_str(),
            stage: update.stage,
            percent: update.percent,
            message: update.message.as_deref(),
            timestamp: at,
        };

        // Held across the write so lines from concurrent reports never interleave
        let mut failures = self.failures.lock().await;
        match self.write_line(&entry).await {
            Ok(()) => failures.record_success(),
            Err(e) => {
                if failures.record_failure() {
                    debug!(path = %self.path.display(), "Diagnostic log write failed: {}", e);
                }
            }
        }
    }

    async fn write_line(&self, entry: &DiagnosticEntry<'_>) -> std::io::Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vshort_models::SessionKey;

    #[tokio::test]
    async fn test_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = DiagnosticLog::new(dir.path().join("logs/progress.jsonl"));
        let key = SessionKey::normalize("https://example.com/v");

        log.append(
            &ProgressUpdate::new(key.clone(), Stage::Downloading, 5, "Downloading"),
            Utc::now(),
        )
        .await;
        log.append(
            &ProgressUpdate::new(key, Stage::Transcribing, 25, "Transcribing"),
            Utc::now(),
        )
        .await;

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["session"], "https://example.com/v");
        assert_eq!(lines[1]["stage"], "transcribing");
        assert_eq!(lines[1]["percent"], 25);
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every open fail
        let blocked = dir.path().join("blocked");
        std::fs::create_dir(&blocked).unwrap();
        let log = DiagnosticLog::new(&blocked);

        for _ in 0..5 {
            log.append(
                &ProgressUpdate::new(SessionKey::normalize("k"), Stage::Downloading, 0, "x"),
                Utc::now(),
            )
            .await;
        }
        assert_eq!(log.failures.lock().await.failure_count(), 5);
    }
}
