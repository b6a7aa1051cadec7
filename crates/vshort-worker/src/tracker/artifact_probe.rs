//! Output store lookups and artifact link derivation.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;
use vshort_models::ArtifactLinks;

/// Knows where deliverables live and how callers reach them.
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    output_dir: PathBuf,
    public_base: String,
}

impl ArtifactLocator {
    pub fn new(output_dir: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Deliverable name for a run finishing at `millis` since the epoch.
    pub fn file_name(millis: i64) -> String {
        format!("viral_short_{}.mp4", millis)
    }

    /// Stream and download links for a deliverable path.
    pub fn links_for(&self, path: &Path) -> ArtifactLinks {
        let encoded = urlencoding::encode(&path.to_string_lossy()).into_owned();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        ArtifactLinks {
            video_url: format!("{}/stream?path={}", self.public_base, encoded),
            download_url: format!("{}/download?path={}", self.public_base, encoded),
            file_name,
            path: path.to_path_buf(),
        }
    }

    /// Most recently modified `.mp4` in the output directory.
    ///
    /// With several sessions finalizing into the same directory this can
    /// pick another session's file; callers prefer an explicit mapping.
    pub async fn latest_artifact(&self) -> Option<PathBuf> {
        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.output_dir.display(), "Output directory unreadable: {}", e);
                return None;
            }
        };

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("mp4") {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
                newest = Some((modified, path));
            }
        }

        newest.map(|(_, path)| path)
    }
}
