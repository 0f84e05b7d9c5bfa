// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Filesystem release host
//!
//! A release is the directory `<root>/<tag>/`; its assets are the files in it.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::{asset_name, ReleaseHost};
use crate::errors::TagrelError;

/// Releases as directories under a root
pub struct LocalDirectoryHost {
    root: PathBuf,
}

impl LocalDirectoryHost {
    /// Create a host rooted at `root`
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the release for `tag`
    fn release_dir(&self, tag: &str) -> Result<PathBuf, TagrelError> {
        let escapes = Path::new(tag)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if tag.is_empty() || escapes {
            return Err(TagrelError::publish_failed(
                tag,
                "tag is not usable as a release directory".to_string(),
            ));
        }

        Ok(self.root.join(tag))
    }
}

#[async_trait]
impl ReleaseHost for LocalDirectoryHost {
    fn name(&self) -> &str {
        "local"
    }

    async fn ensure_release(&self, tag: &str) -> Result<(), TagrelError> {
        let dir = self.release_dir(tag)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| TagrelError::publish_failed(tag, e.to_string()))?;
        debug!(release = %dir.display(), "Release directory ready");
        Ok(())
    }

    async fn upload_asset(&self, tag: &str, path: &Path) -> Result<String, TagrelError> {
        let dir = self.release_dir(tag)?;
        let name = asset_name(path)?;
        let dest = dir.join(&name);
        let partial = dir.join(format!("{}.part", name));

        // Copy then rename so a reader never sees a half-written asset
        tokio::fs::copy(path, &partial)
            .await
            .map_err(|e| TagrelError::publish_failed(tag, format!("{}: {}", name, e)))?;
        tokio::fs::rename(&partial, &dest)
            .await
            .map_err(|e| TagrelError::publish_failed(tag, format!("{}: {}", name, e)))?;

        Ok(dest.to_string_lossy().to_string())
    }

    async fn list_assets(&self, tag: &str) -> Result<Vec<String>, TagrelError> {
        let dir = self.release_dir(tag)?;
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await?.is_file() && !name.ends_with(".part") {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_creates_asset_in_tag_directory() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("app.exe");
        std::fs::write(&artifact, b"MZ").unwrap();

        let host = LocalDirectoryHost::new(temp.path().join("releases"));
        host.ensure_release("v1.0.0").await.unwrap();
        let location = host.upload_asset("v1.0.0", &artifact).await.unwrap();

        assert!(location.ends_with("app.exe"));
        assert_eq!(host.list_assets("v1.0.0").await.unwrap(), vec!["app.exe"]);
    }

    #[tokio::test]
    async fn test_reupload_replaces_asset() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("app.exe");
        let host = LocalDirectoryHost::new(temp.path().join("releases"));
        host.ensure_release("v1.0.0").await.unwrap();

        std::fs::write(&artifact, b"first").unwrap();
        host.upload_asset("v1.0.0", &artifact).await.unwrap();
        std::fs::write(&artifact, b"second").unwrap();
        let location = host.upload_asset("v1.0.0", &artifact).await.unwrap();

        assert_eq!(host.list_assets("v1.0.0").await.unwrap().len(), 1);
        assert_eq!(std::fs::read(location).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_unknown_release_has_no_assets() {
        let temp = TempDir::new().unwrap();
        let host = LocalDirectoryHost::new(temp.path().to_path_buf());
        assert!(host.list_assets("v0.0.1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_escaping_tag_is_rejected() {
        let temp = TempDir::new().unwrap();
        let host = LocalDirectoryHost::new(temp.path().to_path_buf());
        assert!(host.ensure_release("../outside").await.is_err());
    }
}
