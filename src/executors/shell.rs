// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Shell executor
//!
//! Runs a free-form command in the job workspace, after the core steps it is
//! placed between.

use async_trait::async_trait;
use std::time::Instant;
use tokio::process::Command;

use super::{run_captured, ExecutionResult, Executor, StepContext};
use crate::errors::TagrelError;
use crate::workflow::{Action, Step};

/// Shell executor
pub struct ShellExecutor;

impl ShellExecutor {
    /// Create a new shell executor
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    async fn execute(
        &self,
        step: &Step,
        ctx: &StepContext<'_>,
    ) -> Result<ExecutionResult, TagrelError> {
        let Action::Shell { command, shell } = &step.action else {
            return Err(TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: "Expected shell action".to_string(),
            });
        };

        let command = ctx.expressions.expand(command)?;

        let start = Instant::now();
        let mut cmd = Command::new(shell);
        cmd.arg("-c").arg(&command);
        cmd.current_dir(ctx.workspace);
        cmd.envs(ctx.env);

        let result = run_captured(shell, cmd, start).await?;
        Ok(result)
    }

    async fn check_available(&self) -> Result<bool, TagrelError> {
        Ok(which::which("sh").is_ok() || which::which("bash").is_ok())
    }

    fn validate_step(&self, step: &Step) -> Result<(), TagrelError> {
        let Action::Shell { command, .. } = &step.action else {
            return Err(TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: "Not a shell step".to_string(),
            });
        };

        if command.trim().is_empty() {
            return Err(TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: "Shell command is empty".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{ExpressionContext, Os, Permissions, Platform, PushEvent};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn shell_step(command: &str) -> Step {
        Step::new(
            "Package",
            Action::Shell {
                command: command.into(),
                shell: "sh".into(),
            },
        )
    }

    #[test]
    fn test_validate_empty_command_fails() {
        assert!(ShellExecutor::new().validate_step(&shell_step("  ")).is_err());
        assert!(ShellExecutor::new().validate_step(&shell_step("ls")).is_ok());
    }

    #[tokio::test]
    async fn test_runs_in_workspace_with_expanded_command() {
        let temp = TempDir::new().unwrap();
        let event = PushEvent::new("v2.0.0", "octo/app");
        let platform = Platform { os: Os::Linux, target: None };
        let expressions = ExpressionContext::new("release", &event, "run");
        let env = HashMap::from([("GREETING".to_string(), "hi".to_string())]);
        let ctx = StepContext {
            workspace: temp.path(),
            event: &event,
            platform: &platform,
            permissions: Permissions::default(),
            env: &env,
            expressions: &expressions,
            toolchain: None,
            artifacts: &[],
        };

        let step = shell_step("echo \"$GREETING ${{ github.ref_name }}\" > out.txt");
        let result = ShellExecutor::new().execute(&step, &ctx).await.unwrap();

        assert!(result.success, "{}", result.stderr);
        let written = std::fs::read_to_string(temp.path().join("out.txt")).unwrap();
        assert_eq!(written.trim(), "hi v2.0.0");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_a_failed_result() {
        let temp = TempDir::new().unwrap();
        let event = PushEvent::new("v2.0.0", "octo/app");
        let platform = Platform { os: Os::Linux, target: None };
        let expressions = ExpressionContext::new("release", &event, "run");
        let env = HashMap::new();
        let ctx = StepContext {
            workspace: temp.path(),
            event: &event,
            platform: &platform,
            permissions: Permissions::default(),
            env: &env,
            expressions: &expressions,
            toolchain: None,
            artifacts: &[],
        };

        let result = ShellExecutor::new()
            .execute(&shell_step("echo broken >&2; exit 4"), &ctx)
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, 4);
        assert!(result.stderr.contains("broken"));
    }
}
