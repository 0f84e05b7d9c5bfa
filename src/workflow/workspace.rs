// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Job workspaces
//!
//! Each job checks out into `<root>/<run-id>/<platform>/src`. The job
//! directory is removed when the workspace is dropped, unless kept.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::TagrelError;
use crate::workflow::Platform;

/// Default root for job workspaces: the user cache directory, or the system
/// temp directory when there is none
pub fn default_root() -> PathBuf {
    directories::ProjectDirs::from("", "", "tagrel")
        .map(|dirs| dirs.cache_dir().join("workspaces"))
        .unwrap_or_else(|| std::env::temp_dir().join("tagrel").join("workspaces"))
}

/// A job's scratch directory
#[derive(Debug)]
pub struct Workspace {
    job_dir: PathBuf,
    checkout: PathBuf,
    keep: bool,
}

impl Workspace {
    /// Create the job directory for `platform` in run `run_id`
    pub fn create(
        root: &Path,
        run_id: &str,
        platform: &Platform,
        keep: bool,
    ) -> Result<Self, TagrelError> {
        let job_dir = root.join(run_id).join(slug(&platform.label()));
        std::fs::create_dir_all(&job_dir)?;
        debug!(workspace = %job_dir.display(), "Created job workspace");

        Ok(Self {
            checkout: job_dir.join("src"),
            job_dir,
            keep,
        })
    }

    /// Checkout directory; does not exist until the checkout step ran
    pub fn path(&self) -> &Path {
        &self.checkout
    }

    /// The job directory holding the checkout
    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.keep {
            return;
        }

        if let Err(e) = std::fs::remove_dir_all(&self.job_dir) {
            warn!(workspace = %self.job_dir.display(), error = %e, "Failed to remove job workspace");
            return;
        }

        // The run directory goes with its last job
        if let Some(run_dir) = self.job_dir.parent() {
            let _ = std::fs::remove_dir(run_dir);
        }
    }
}

/// Filesystem-safe form of a platform label
fn slug(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Os;
    use tempfile::TempDir;

    #[test]
    fn test_slug() {
        assert_eq!(slug("windows"), "windows");
        assert_eq!(
            slug("linux (x86_64-pc-windows-gnu)"),
            "linux-x86_64-pc-windows-gnu"
        );
    }

    #[test]
    fn test_removed_on_drop() {
        let temp = TempDir::new().unwrap();
        let platform = Platform { os: Os::Linux, target: None };

        let ws = Workspace::create(temp.path(), "run1", &platform, false).unwrap();
        std::fs::create_dir_all(ws.path()).unwrap();
        std::fs::write(ws.path().join("Cargo.toml"), "").unwrap();
        let job_dir = ws.job_dir().to_path_buf();
        drop(ws);

        assert!(!job_dir.exists());
        assert!(!temp.path().join("run1").exists());
    }

    #[test]
    fn test_kept_workspace_survives() {
        let temp = TempDir::new().unwrap();
        let platform = Platform { os: Os::Windows, target: None };

        let ws = Workspace::create(temp.path(), "run2", &platform, true).unwrap();
        let job_dir = ws.job_dir().to_path_buf();
        drop(ws);

        assert!(job_dir.is_dir());
    }
}
