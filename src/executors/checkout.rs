// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Checkout executor
//!
//! Clones the repository at the pushed tag into the job workspace.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Instant;
use tokio::process::Command;

use super::{run_captured, ExecutionResult, Executor, StepContext};
use crate::errors::TagrelError;
use crate::release::clone_source;
use crate::workflow::{Action, Step};

/// Checkout executor
pub struct CheckoutExecutor;

impl CheckoutExecutor {
    /// Create a new checkout executor
    pub fn new() -> Self {
        Self
    }

    /// `git clone` arguments for a tag checkout
    fn clone_args(
        repository: &str,
        tag: &str,
        destination: &std::path::Path,
        submodules: bool,
        fetch_depth: u32,
    ) -> Vec<String> {
        let mut args = vec![
            "-c".to_string(),
            "advice.detachedHead=false".to_string(),
            "clone".to_string(),
            "--quiet".to_string(),
        ];

        if fetch_depth > 0 {
            args.push("--depth".into());
            args.push(fetch_depth.to_string());
            // Local paths ignore --depth unless cloned through file://
            args.push("--no-local".into());
        }

        args.push(if submodules {
            "--recurse-submodules".into()
        } else {
            "--no-recurse-submodules".into()
        });

        args.push("--branch".into());
        args.push(tag.to_string());
        args.push(clone_source(repository));
        args.push(destination.to_string_lossy().to_string());
        args
    }
}

impl Default for CheckoutExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for CheckoutExecutor {
    async fn execute(
        &self,
        step: &Step,
        ctx: &StepContext<'_>,
    ) -> Result<ExecutionResult, TagrelError> {
        let Action::Checkout {
            submodules,
            fetch_depth,
        } = &step.action
        else {
            return Err(TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: "Expected checkout action".to_string(),
            });
        };

        let tag = ctx.event.tag_name().ok_or_else(|| TagrelError::InvalidStep {
            step: step.name.clone(),
            reason: format!("'{}' is not a tag ref", ctx.event.git_ref),
        })?;

        let git = which::which("git").map_err(|_| TagrelError::tool_not_found("git"))?;

        if let Some(parent) = ctx.workspace.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let start = Instant::now();
        let mut cmd = Command::new(git);
        cmd.args(Self::clone_args(
            &ctx.event.repository,
            tag,
            ctx.workspace,
            *submodules,
            *fetch_depth,
        ));
        cmd.envs(ctx.env);

        let result = run_captured("git", cmd, start).await?;
        if !result.success {
            return Ok(result);
        }

        Ok(ExecutionResult {
            outputs: vec![PathBuf::from(ctx.workspace)],
            ..result
        })
    }

    async fn check_available(&self) -> Result<bool, TagrelError> {
        Ok(which::which("git").is_ok())
    }

    fn validate_step(&self, step: &Step) -> Result<(), TagrelError> {
        match &step.action {
            Action::Checkout { .. } => Ok(()),
            _ => Err(TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: "Not a checkout step".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{ExpressionContext, Os, Permissions, Platform, PushEvent};
    use std::collections::HashMap;
    use std::path::Path;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    #[test]
    fn test_submodules_disabled_by_default() {
        let args = CheckoutExecutor::clone_args("repo", "v1.0.0", Path::new("ws"), false, 1);
        assert!(args.contains(&"--no-recurse-submodules".to_string()));
        assert!(!args.contains(&"--recurse-submodules".to_string()));

        let branch = args.iter().position(|a| a == "--branch").unwrap();
        assert_eq!(args[branch + 1], "v1.0.0");
    }

    #[test]
    fn test_slug_is_cloned_from_github() {
        let args = CheckoutExecutor::clone_args(
            "octocat/Hello-World",
            "v1.0.0",
            Path::new("ws"),
            false,
            1,
        );
        let source = args.iter().position(|a| a == "v1.0.0").unwrap() + 1;
        assert_eq!(args[source], "https://github.com/octocat/Hello-World.git");
    }

    #[test]
    fn test_full_history_omits_depth() {
        let args = CheckoutExecutor::clone_args("repo", "v1", Path::new("ws"), true, 0);
        assert!(!args.contains(&"--depth".to_string()));
        assert!(args.contains(&"--recurse-submodules".to_string()));
    }

    #[tokio::test]
    async fn test_clones_tagged_commit() {
        if which::which("git").is_err() {
            return;
        }

        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("origin");
        std::fs::create_dir_all(&origin).unwrap();
        git(&origin, &["init", "--quiet"]);
        std::fs::write(origin.join("README"), "tagged").unwrap();
        git(&origin, &["add", "README"]);
        git(&origin, &["commit", "--quiet", "-m", "release"]);
        git(&origin, &["tag", "v1.0.0"]);

        let workspace = temp.path().join("ws").join("src");
        let event = PushEvent::new("v1.0.0", &origin.to_string_lossy());
        let platform = Platform { os: Os::Linux, target: None };
        let expressions = ExpressionContext::new("release", &event, "run");
        let env = HashMap::new();
        let ctx = StepContext {
            workspace: &workspace,
            event: &event,
            platform: &platform,
            permissions: Permissions::default(),
            env: &env,
            expressions: &expressions,
            toolchain: None,
            artifacts: &[],
        };

        let step = Step::new("Checkout", Action::Checkout { submodules: false, fetch_depth: 1 });
        let result = CheckoutExecutor::new().execute(&step, &ctx).await.unwrap();

        assert!(result.success, "{}", result.stderr);
        assert_eq!(std::fs::read_to_string(workspace.join("README")).unwrap(), "tagged");
    }

    #[tokio::test]
    async fn test_missing_tag_fails() {
        if which::which("git").is_err() {
            return;
        }

        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("origin");
        std::fs::create_dir_all(&origin).unwrap();
        git(&origin, &["init", "--quiet"]);
        std::fs::write(origin.join("README"), "x").unwrap();
        git(&origin, &["add", "README"]);
        git(&origin, &["commit", "--quiet", "-m", "init"]);

        let workspace = temp.path().join("ws").join("src");
        let event = PushEvent::new("v9.9.9", &origin.to_string_lossy());
        let platform = Platform { os: Os::Linux, target: None };
        let expressions = ExpressionContext::new("release", &event, "run");
        let env = HashMap::new();
        let ctx = StepContext {
            workspace: &workspace,
            event: &event,
            platform: &platform,
            permissions: Permissions::default(),
            env: &env,
            expressions: &expressions,
            toolchain: None,
            artifacts: &[],
        };

        let step = Step::new("Checkout", Action::Checkout { submodules: false, fetch_depth: 1 });
        let result = CheckoutExecutor::new().execute(&step, &ctx).await.unwrap();
        assert!(!result.success);
    }
}
