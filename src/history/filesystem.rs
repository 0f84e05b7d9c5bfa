// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Filesystem-based run history
//!
//! Stores one JSON file per run in a history directory.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{HistoryStats, RunStore};
use crate::errors::TagrelError;
use crate::workflow::{RunReport, RunState};

/// Filesystem-based run history
pub struct FilesystemRunStore {
    /// History directory
    dir: PathBuf,
}

impl FilesystemRunStore {
    /// Create a store, creating its directory if needed
    pub fn new(dir: PathBuf) -> Result<Self, TagrelError> {
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| TagrelError::HistoryError {
                message: format!("Failed to create history directory: {}", e),
            })?;
        }

        Ok(Self { dir })
    }

    /// History directory
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn record_path(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", run_id))
    }

    /// Paths of all record files
    async fn record_files(&self) -> Result<Vec<PathBuf>, TagrelError> {
        let mut files = Vec::new();

        if !self.dir.exists() {
            return Ok(files);
        }

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            TagrelError::HistoryError {
                message: format!("Failed to read history directory: {}", e),
            }
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| TagrelError::HistoryError {
            message: format!("Failed to read history entry: {}", e),
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }

        Ok(files)
    }

    async fn read_record(path: &PathBuf) -> Option<RunReport> {
        let content = tokio::fs::read_to_string(path).await.ok()?;
        serde_json::from_str(&content).ok()
    }
}

#[async_trait]
impl RunStore for FilesystemRunStore {
    async fn record(&self, report: &RunReport) -> Result<(), TagrelError> {
        let json = serde_json::to_string_pretty(report).map_err(|e| TagrelError::HistoryError {
            message: format!("Failed to serialize run record: {}", e),
        })?;

        let path = self.record_path(&report.run_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| TagrelError::HistoryError {
            message: format!("Failed to write run record: {}", e),
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| TagrelError::HistoryError {
            message: format!("Failed to write run record: {}", e),
        })?;

        Ok(())
    }

    async fn get(&self, run_id: &str) -> Result<Option<RunReport>, TagrelError> {
        let exact = self.record_path(run_id);
        if exact.exists() {
            return Ok(Self::read_record(&exact).await);
        }

        let matches: Vec<PathBuf> = self
            .record_files()
            .await?
            .into_iter()
            .filter(|p| {
                p.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.starts_with(run_id))
            })
            .collect();

        match matches.as_slice() {
            [] => Ok(None),
            [only] => Ok(Self::read_record(only).await),
            _ => Err(TagrelError::HistoryError {
                message: format!("Run id prefix '{}' is ambiguous ({} matches)", run_id, matches.len()),
            }),
        }
    }

    async fn list(&self) -> Result<Vec<RunReport>, TagrelError> {
        let mut runs = Vec::new();
        for path in self.record_files().await? {
            if let Some(report) = Self::read_record(&path).await {
                runs.push(report);
            }
        }

        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    async fn clear(&self) -> Result<(), TagrelError> {
        for path in self.record_files().await? {
            tokio::fs::remove_file(&path).await.map_err(|e| TagrelError::HistoryError {
                message: format!("Failed to remove {}: {}", path.display(), e),
            })?;
        }
        Ok(())
    }

    async fn stats(&self) -> Result<HistoryStats, TagrelError> {
        let mut stats = HistoryStats::default();

        for path in self.record_files().await? {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                stats.size_bytes += meta.len();
            }

            let Some(report) = Self::read_record(&path).await else {
                continue;
            };

            stats.runs += 1;
            match report.state {
                RunState::Published => stats.published += 1,
                RunState::Failed => stats.failed += 1,
                RunState::Cancelled => stats.cancelled += 1,
                _ => {}
            }

            if stats.newest_run.map_or(true, |t| report.started_at > t) {
                stats.newest_run = Some(report.started_at);
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn report(run_id: &str, state: RunState, age_secs: u64) -> RunReport {
        RunReport {
            run_id: run_id.into(),
            workflow: "release".into(),
            git_ref: "refs/tags/v1.0.0".into(),
            repository: ".".into(),
            group: "release-refs/tags/v1.0.0".into(),
            state,
            jobs: vec![],
            started_at: SystemTime::now() - Duration::from_secs(age_secs),
            duration_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_record_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemRunStore::new(temp_dir.path().join("runs")).unwrap();

        store.record(&report("abcdef0123456789", RunState::Failed, 0)).await.unwrap();

        let found = store.get("abcdef0123456789").await.unwrap().unwrap();
        assert_eq!(found.state, RunState::Failed);

        let by_prefix = store.get("abcdef").await.unwrap().unwrap();
        assert_eq!(by_prefix.run_id, "abcdef0123456789");

        assert!(store.get("ffff").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemRunStore::new(temp_dir.path().to_path_buf()).unwrap();

        store.record(&report("old", RunState::Failed, 60)).await.unwrap();
        store.record(&report("new", RunState::Published, 0)).await.unwrap();

        let runs = store.list().await.unwrap();
        assert_eq!(runs.iter().map(|r| r.run_id.as_str()).collect::<Vec<_>>(), vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemRunStore::new(temp_dir.path().to_path_buf()).unwrap();

        store.record(&report("a1", RunState::Published, 0)).await.unwrap();
        store.record(&report("a2", RunState::Cancelled, 0)).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.cancelled, 1);
        assert!(stats.size_bytes > 0);

        assert!(store.get("a").await.is_err());

        store.clear().await.unwrap();
        assert_eq!(store.stats().await.unwrap().runs, 0);
    }
}
