// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Run history
//!
//! Every run that passes the trigger is recorded, whatever its outcome.
//! Records are never read back by later runs, so a re-run after a failure
//! starts from a clean slate.

mod filesystem;
mod hash;

pub use filesystem::FilesystemRunStore;
pub use hash::{digest_file, new_run_id};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::errors::TagrelError;
use crate::workflow::RunReport;

/// Default history directory, relative to the working directory
pub const DEFAULT_HISTORY_DIR: &str = ".tagrel/runs";

/// Trait for run history stores
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a finished run
    async fn record(&self, report: &RunReport) -> Result<(), TagrelError>;

    /// Look up a run by id or unique id prefix
    async fn get(&self, run_id: &str) -> Result<Option<RunReport>, TagrelError>;

    /// All runs, newest first
    async fn list(&self) -> Result<Vec<RunReport>, TagrelError>;

    /// Forget all runs
    async fn clear(&self) -> Result<(), TagrelError>;

    /// History statistics
    async fn stats(&self) -> Result<HistoryStats, TagrelError>;
}

/// History statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Number of recorded runs
    pub runs: usize,
    /// Runs that published
    pub published: usize,
    /// Runs that failed
    pub failed: usize,
    /// Runs superseded by a newer run
    pub cancelled: usize,
    /// Total size in bytes
    pub size_bytes: u64,
    /// Newest run start
    pub newest_run: Option<SystemTime>,
}

impl HistoryStats {
    /// Format size for display
    pub fn formatted_size(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;

        if self.size_bytes >= MB {
            format!("{:.2} MB", self.size_bytes as f64 / MB as f64)
        } else if self.size_bytes >= KB {
            format!("{:.2} KB", self.size_bytes as f64 / KB as f64)
        } else {
            format!("{} bytes", self.size_bytes)
        }
    }
}
