// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! GitHub release host
//!
//! Drives the `gh` CLI. Authentication is whatever `gh` is configured with,
//! usually `GH_TOKEN` or a prior `gh auth login`.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use super::{asset_name, ReleaseHost};
use crate::errors::TagrelError;

/// Where `gh` finds the repository
#[derive(Debug, Clone, PartialEq, Eq)]
enum RepoSelector {
    /// `owner/name`, passed as `--repo`
    Slug(String),
    /// A local clone; `gh` reads its remotes
    Checkout(PathBuf),
}

/// GitHub releases through `gh`
pub struct GithubCliHost {
    repo: RepoSelector,
}

#[derive(Deserialize)]
struct ReleaseView {
    #[serde(default)]
    assets: Vec<AssetView>,
}

#[derive(Deserialize)]
struct AssetView {
    name: String,
}

impl GithubCliHost {
    /// Host for `repository`: a GitHub URL, `owner/name`, or a local clone
    pub fn new(repository: &str) -> Self {
        let repo = match github_slug(repository) {
            Some(slug) => RepoSelector::Slug(slug),
            None => RepoSelector::Checkout(PathBuf::from(repository)),
        };
        Self { repo }
    }

    fn command(&self, args: &[&str]) -> Result<Command, TagrelError> {
        let gh = which::which("gh").map_err(|_| TagrelError::tool_not_found("gh"))?;

        let mut cmd = Command::new(gh);
        cmd.args(args);
        match &self.repo {
            RepoSelector::Slug(slug) => {
                cmd.arg("--repo").arg(slug);
            }
            RepoSelector::Checkout(dir) => {
                cmd.current_dir(dir);
            }
        }
        cmd.kill_on_drop(true);
        Ok(cmd)
    }

    async fn gh(&self, tag: &str, args: &[&str]) -> Result<std::process::Output, TagrelError> {
        let mut cmd = self.command(args)?;
        debug!(command = ?cmd.as_std(), "Running gh");
        cmd.output()
            .await
            .map_err(|e| TagrelError::publish_failed(tag, format!("gh execution failed: {}", e)))
    }

    fn download_url(&self, tag: &str, name: &str) -> String {
        match &self.repo {
            RepoSelector::Slug(slug) => {
                format!("https://github.com/{}/releases/download/{}/{}", slug, tag, name)
            }
            RepoSelector::Checkout(_) => format!("{}/{}", tag, name),
        }
    }
}

#[async_trait]
impl ReleaseHost for GithubCliHost {
    fn name(&self) -> &str {
        "github"
    }

    async fn ensure_release(&self, tag: &str) -> Result<(), TagrelError> {
        let view = self.gh(tag, &["release", "view", tag, "--json", "tagName"]).await?;
        if view.status.success() {
            debug!(tag, "Release already exists");
            return Ok(());
        }

        let create = self
            .gh(
                tag,
                &["release", "create", tag, "--verify-tag", "--title", tag, "--notes", ""],
            )
            .await?;
        if create.status.success() {
            info!(tag, "Created release");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&create.stderr).trim().to_string();
        // Another run of the same tag may have created it in between
        if stderr.contains("already exists") {
            return Ok(());
        }

        Err(TagrelError::publish_failed(tag, stderr))
    }

    async fn upload_asset(&self, tag: &str, path: &Path) -> Result<String, TagrelError> {
        let name = asset_name(path)?;
        let file = path.to_string_lossy().to_string();

        let output = self
            .gh(tag, &["release", "upload", tag, &file, "--clobber"])
            .await?;
        if !output.status.success() {
            return Err(TagrelError::publish_failed(
                tag,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(self.download_url(tag, &name))
    }

    async fn list_assets(&self, tag: &str) -> Result<Vec<String>, TagrelError> {
        let output = self.gh(tag, &["release", "view", tag, "--json", "assets"]).await?;
        if !output.status.success() {
            return Err(TagrelError::publish_failed(
                tag,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let view: ReleaseView = serde_json::from_slice(&output.stdout)?;
        Ok(view.assets.into_iter().map(|a| a.name).collect())
    }
}

/// What `git clone` should fetch for `repository`
///
/// A bare `owner/name` slug becomes its GitHub HTTPS remote; paths and URLs
/// are passed through.
pub(crate) fn clone_source(repository: &str) -> String {
    let bare = !repository.contains(':') && !repository.starts_with('/');
    match github_slug(repository) {
        Some(slug) if bare && repository.trim_end_matches('/').trim_end_matches(".git") == slug => {
            format!("https://github.com/{}.git", slug)
        }
        _ => repository.to_string(),
    }
}

/// `owner/name` from a GitHub remote or a bare slug
fn github_slug(repository: &str) -> Option<String> {
    let trimmed = repository.trim().trim_end_matches('/');
    let rest = trimmed
        .strip_prefix("https://github.com/")
        .or_else(|| trimmed.strip_prefix("http://github.com/"))
        .or_else(|| trimmed.strip_prefix("ssh://git@github.com/"))
        .or_else(|| trimmed.strip_prefix("git@github.com:"))
        .or_else(|| {
            // A bare slug must not be an existing local path
            let bare = !trimmed.contains(':') && !Path::new(trimmed).exists();
            bare.then_some(trimmed)
        })?;
    let rest = rest.trim_end_matches(".git");

    let mut parts = rest.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().filter(|s| !s.is_empty())?;
    if parts.next().is_some() || owner.starts_with('.') {
        return None;
    }

    Some(format!("{}/{}", owner, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_slug_from_remotes() {
        assert_eq!(github_slug("https://github.com/octo/app.git").as_deref(), Some("octo/app"));
        assert_eq!(github_slug("git@github.com:octo/app.git").as_deref(), Some("octo/app"));
        assert_eq!(github_slug("octo/app").as_deref(), Some("octo/app"));
        assert_eq!(github_slug("https://gitlab.com/octo/app"), None);
        assert_eq!(github_slug("octo/app/extra"), None);
    }

    #[test]
    fn test_local_clone_is_not_a_slug() {
        let temp = TempDir::new().unwrap();
        let host = GithubCliHost::new(&temp.path().to_string_lossy());
        assert!(matches!(host.repo, RepoSelector::Checkout(_)));
    }

    #[test]
    fn test_clone_source_expands_bare_slug() {
        assert_eq!(
            clone_source("octocat/Hello-World"),
            "https://github.com/octocat/Hello-World.git"
        );
        assert_eq!(
            clone_source("git@github.com:octo/app.git"),
            "git@github.com:octo/app.git"
        );
        assert_eq!(
            clone_source("https://gitlab.com/octo/app.git"),
            "https://gitlab.com/octo/app.git"
        );

        let temp = TempDir::new().unwrap();
        let local = temp.path().to_string_lossy().to_string();
        assert_eq!(clone_source(&local), local);
    }

    #[test]
    fn test_download_url() {
        let host = GithubCliHost::new("octo/app");
        assert_eq!(
            host.download_url("v1.0.0", "app.exe"),
            "https://github.com/octo/app/releases/download/v1.0.0/app.exe"
        );
    }

    #[test]
    fn test_release_view_parsing() {
        let view: ReleaseView =
            serde_json::from_str(r#"{"assets":[{"name":"app.exe","size":3}]}"#).unwrap();
        assert_eq!(view.assets[0].name, "app.exe");
    }
}
