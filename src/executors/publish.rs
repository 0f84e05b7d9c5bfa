// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Publish executor
//!
//! Attaches the build artifact (or the listed files) to the release of the
//! pushed tag. Requires write access to repository contents; without it the
//! step fails before anything is uploaded.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::{ExecutionResult, Executor, StepContext};
use crate::errors::TagrelError;
use crate::history::digest_file;
use crate::release::ReleaseHost;
use crate::workflow::{Access, Action, PublishedAsset, Step};

/// Publish executor
pub struct PublishExecutor {
    host: Arc<dyn ReleaseHost>,
}

impl PublishExecutor {
    /// Create a publish executor uploading to `host`
    pub fn new(host: Arc<dyn ReleaseHost>) -> Self {
        Self { host }
    }

    /// Files the step uploads, resolved against the workspace
    fn resolve_files(
        step: &Step,
        files: &[String],
        ctx: &StepContext<'_>,
    ) -> Result<Vec<PathBuf>, TagrelError> {
        let paths: Vec<PathBuf> = if files.is_empty() {
            ctx.artifacts.to_vec()
        } else {
            files
                .iter()
                .map(|f| Ok(ctx.workspace.join(ctx.expressions.expand(f)?)))
                .collect::<Result<_, TagrelError>>()?
        };

        if paths.is_empty() {
            return Err(TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: "Nothing to publish: no build artifact and no files listed".to_string(),
            });
        }

        if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
            return Err(TagrelError::ArtifactMissing {
                path: missing.clone(),
            });
        }

        Ok(paths)
    }
}

#[async_trait]
impl Executor for PublishExecutor {
    async fn execute(
        &self,
        step: &Step,
        ctx: &StepContext<'_>,
    ) -> Result<ExecutionResult, TagrelError> {
        let Action::Publish { files } = &step.action else {
            return Err(TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: "Expected publish action".to_string(),
            });
        };

        if ctx.permissions.contents < Access::Write {
            return Err(TagrelError::PermissionDenied {
                required: Access::Write.to_string(),
            });
        }

        let tag = ctx.event.tag_name().ok_or_else(|| TagrelError::InvalidStep {
            step: step.name.clone(),
            reason: format!("'{}' is not a tag ref", ctx.event.git_ref),
        })?;

        let paths = Self::resolve_files(step, files, ctx)?;

        let start = Instant::now();
        self.host.ensure_release(tag).await?;

        let mut assets = Vec::with_capacity(paths.len());
        let mut lines = Vec::with_capacity(paths.len());
        for path in &paths {
            let size = tokio::fs::metadata(path).await?.len();
            let digest = digest_file(path)?;
            let location = self.host.upload_asset(tag, path).await?;
            let name = crate::release::asset_name(path)?;

            info!(tag, asset = %name, host = self.host.name(), "Uploaded asset");
            lines.push(format!("{} -> {}", name, location));

            assets.push(PublishedAsset {
                tag: tag.to_string(),
                name,
                size,
                digest,
                location,
            });
        }

        let listed = self.host.list_assets(tag).await?;
        if let Some(absent) = assets.iter().find(|a| !listed.contains(&a.name)) {
            return Err(TagrelError::publish_failed(
                tag,
                format!("'{}' is not listed on the release after upload", absent.name),
            ));
        }

        Ok(ExecutionResult {
            assets,
            ..ExecutionResult::success(lines.join("\n"), start.elapsed(), paths)
        })
    }

    async fn check_available(&self) -> Result<bool, TagrelError> {
        Ok(true)
    }

    fn validate_step(&self, step: &Step) -> Result<(), TagrelError> {
        match &step.action {
            Action::Publish { .. } => Ok(()),
            _ => Err(TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: "Not a publish step".to_string(),
            }),
        }
    }
}
