// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Release hosts
//!
//! A release host owns the releases that build artifacts are attached to.
//! Re-uploading an asset of the same name replaces it, so a repeated run of
//! the same tag leaves one copy of each asset.

mod github;
mod local;

pub use github::GithubCliHost;
pub(crate) use github::clone_source;
pub use local::LocalDirectoryHost;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::errors::TagrelError;
use crate::workflow::{ReleaseConfig, ReleaseHostKind};

/// Where releases and their assets live
#[async_trait]
pub trait ReleaseHost: Send + Sync {
    /// Host name for logs and reports
    fn name(&self) -> &str;

    /// Create the release for `tag` unless it already exists
    async fn ensure_release(&self, tag: &str) -> Result<(), TagrelError>;

    /// Attach `path` to the release for `tag`, replacing any asset of the
    /// same name; returns where the asset can be fetched
    async fn upload_asset(&self, tag: &str, path: &Path) -> Result<String, TagrelError>;

    /// Names of the assets attached to the release for `tag`
    async fn list_assets(&self, tag: &str) -> Result<Vec<String>, TagrelError>;
}

/// Select the release host for a workflow
///
/// `override_dir` (from `--release-dir`) forces the local host.
pub fn host_for(
    config: &ReleaseConfig,
    repository: &str,
    override_dir: Option<&Path>,
) -> Result<Arc<dyn ReleaseHost>, TagrelError> {
    if let Some(dir) = override_dir {
        return Ok(Arc::new(LocalDirectoryHost::new(dir.to_path_buf())));
    }

    match config.host {
        ReleaseHostKind::Github => Ok(Arc::new(GithubCliHost::new(repository))),
        ReleaseHostKind::Local => {
            let dir = config
                .directory
                .clone()
                .ok_or_else(|| TagrelError::InvalidWorkflow {
                    reason: "release host 'local' needs a directory".to_string(),
                    help: Some("Set release.directory or pass --release-dir".to_string()),
                })?;
            Ok(Arc::new(LocalDirectoryHost::new(dir)))
        }
    }
}

/// File name of an asset as uploaded
pub(crate) fn asset_name(path: &Path) -> Result<String, TagrelError> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| TagrelError::ArtifactMissing {
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_override_dir_forces_local_host() {
        let config = ReleaseConfig::default();
        let host = host_for(&config, "octo/app", Some(Path::new("/tmp/releases"))).unwrap();
        assert_eq!(host.name(), "local");
    }

    #[test]
    fn test_github_is_default() {
        let host = host_for(&ReleaseConfig::default(), "octo/app", None).unwrap();
        assert_eq!(host.name(), "github");
    }

    #[test]
    fn test_local_without_directory_is_rejected() {
        let config = ReleaseConfig {
            host: ReleaseHostKind::Local,
            directory: None,
        };
        assert!(host_for(&config, "octo/app", None).is_err());

        let config = ReleaseConfig {
            host: ReleaseHostKind::Local,
            directory: Some(PathBuf::from("dist")),
        };
        assert_eq!(host_for(&config, "octo/app", None).unwrap().name(), "local");
    }

    #[test]
    fn test_asset_name() {
        assert_eq!(asset_name(Path::new("target/release/app.exe")).unwrap(), "app.exe");
        assert!(asset_name(Path::new("/")).is_err());
    }
}
