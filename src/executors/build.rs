// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Build executor
//!
//! Runs `cargo build` in the job workspace and locates the artifact named by
//! `BIN_NAME`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;
use tracing::info;

use super::{run_captured, ExecutionResult, Executor, StepContext};
use crate::errors::TagrelError;
use crate::workflow::{Action, Platform, Step};

/// Variable naming the binary to publish, without extension
pub const BIN_NAME_VAR: &str = "BIN_NAME";

/// Build executor
pub struct BuildExecutor;

impl BuildExecutor {
    /// Create a new build executor
    pub fn new() -> Self {
        Self
    }

    /// `cargo` arguments for a build
    fn build_args(
        toolchain: Option<&str>,
        release: bool,
        verbose: bool,
        flags: &[String],
        platform: &Platform,
    ) -> Vec<String> {
        let mut args = Vec::new();

        // rustup's cargo proxy selects the toolchain installed by the earlier step
        if let Some(toolchain) = toolchain {
            args.push(format!("+{}", toolchain));
        }

        args.push("build".into());
        if release {
            args.push("--release".into());
        }
        if verbose {
            args.push("--verbose".into());
        }
        if let Some(target) = &platform.target {
            args.push("--target".into());
            args.push(target.clone());
        }
        args.extend(flags.iter().cloned());
        args
    }

    /// Where the build leaves `bin_name`
    pub fn artifact_path(
        platform: &Platform,
        workspace: &Path,
        bin_name: &str,
        release: bool,
    ) -> PathBuf {
        if release {
            platform.artifact_path(workspace, bin_name)
        } else {
            platform
                .output_dir(workspace, "debug")
                .join(format!("{}{}", bin_name, platform.exe_suffix()))
        }
    }
}

impl Default for BuildExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for BuildExecutor {
    async fn execute(
        &self,
        step: &Step,
        ctx: &StepContext<'_>,
    ) -> Result<ExecutionResult, TagrelError> {
        let Action::Build {
            release,
            verbose,
            flags,
        } = &step.action
        else {
            return Err(TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: "Expected build action".to_string(),
            });
        };

        let bin_name = ctx
            .env
            .get(BIN_NAME_VAR)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: format!("{} is not set; cannot locate the build artifact", BIN_NAME_VAR),
            })?;

        let cargo = which::which("cargo").map_err(|_| TagrelError::tool_not_found("cargo"))?;

        let start = Instant::now();
        let mut cmd = Command::new(cargo);
        cmd.args(Self::build_args(
            ctx.toolchain,
            *release,
            *verbose,
            flags,
            ctx.platform,
        ));
        cmd.current_dir(ctx.workspace);
        cmd.envs(ctx.env);

        let result = run_captured("cargo", cmd, start).await?;
        if !result.success {
            return Ok(result);
        }

        let artifact = Self::artifact_path(ctx.platform, ctx.workspace, bin_name, *release);
        if !artifact.is_file() {
            return Err(TagrelError::ArtifactMissing { path: artifact });
        }

        info!(artifact = %artifact.display(), "Build artifact ready");

        Ok(ExecutionResult {
            outputs: vec![artifact],
            ..result
        })
    }

    async fn check_available(&self) -> Result<bool, TagrelError> {
        Ok(which::which("cargo").is_ok())
    }

    fn validate_step(&self, step: &Step) -> Result<(), TagrelError> {
        match &step.action {
            Action::Build { .. } => Ok(()),
            _ => Err(TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: "Not a build step".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{ExpressionContext, Os, Permissions, PushEvent};
    use std::collections::HashMap;

    #[test]
    fn test_release_verbose_args() {
        let platform = Platform { os: Os::Windows, target: None };
        let args = BuildExecutor::build_args(Some("stable"), true, true, &[], &platform);
        assert_eq!(args, vec!["+stable", "build", "--release", "--verbose"]);
    }

    #[test]
    fn test_cross_target_args() {
        let platform = Platform {
            os: Os::Linux,
            target: Some("x86_64-pc-windows-gnu".into()),
        };
        let args = BuildExecutor::build_args(None, true, false, &["--locked".to_string()], &platform);
        assert_eq!(
            args,
            vec!["build", "--release", "--target", "x86_64-pc-windows-gnu", "--locked"]
        );
    }

    #[test]
    fn test_artifact_path_for_app() {
        let platform = Platform { os: Os::Windows, target: None };
        let path = BuildExecutor::artifact_path(&platform, Path::new("ws"), "app", true);
        assert!(path.ends_with("target/release/app.exe"));

        let debug = BuildExecutor::artifact_path(&platform, Path::new("ws"), "app", false);
        assert!(debug.ends_with("target/debug/app.exe"));
    }

    #[tokio::test]
    async fn test_missing_bin_name_is_rejected() {
        let event = PushEvent::new("v1.0.0", ".");
        let platform = Platform { os: Os::Windows, target: None };
        let expressions = ExpressionContext::new("release", &event, "run");
        let env = HashMap::new();
        let ctx = StepContext {
            workspace: Path::new("."),
            event: &event,
            platform: &platform,
            permissions: Permissions::default(),
            env: &env,
            expressions: &expressions,
            toolchain: None,
            artifacts: &[],
        };
        let step = Step::new(
            "Build",
            Action::Build {
                release: true,
                verbose: true,
                flags: vec![],
            },
        );

        let err = BuildExecutor::new().execute(&step, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("BIN_NAME"));
    }
}
