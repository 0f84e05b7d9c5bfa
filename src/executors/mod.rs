// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Step executors
//!
//! This module provides the executor trait and one implementation per step
//! kind (checkout, toolchain, build, publish, shell).

mod build;
mod checkout;
mod publish;
mod shell;
mod toolchain;

pub use build::BuildExecutor;
pub use checkout::CheckoutExecutor;
pub use publish::PublishExecutor;
pub use shell::ShellExecutor;
pub use toolchain::ToolchainExecutor;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use crate::errors::TagrelError;
use crate::release::ReleaseHost;
use crate::workflow::{
    ExpressionContext, Permissions, Platform, PublishedAsset, PushEvent, Step, StepKind,
};

/// Result of step execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Whether execution succeeded
    pub success: bool,

    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Exit code
    pub exit_code: i32,

    /// Files produced (the build artifact)
    pub outputs: Vec<PathBuf>,

    /// Assets attached to a release
    pub assets: Vec<PublishedAsset>,

    /// Toolchain made available to later steps
    pub toolchain: Option<String>,

    /// Execution duration
    pub duration: Duration,
}

impl ExecutionResult {
    /// Create a successful result
    pub fn success(stdout: String, duration: Duration, outputs: Vec<PathBuf>) -> Self {
        Self {
            success: true,
            stdout,
            stderr: String::new(),
            exit_code: 0,
            outputs,
            assets: vec![],
            toolchain: None,
            duration,
        }
    }

    /// Create a failed result
    pub fn failure(stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr,
            exit_code,
            outputs: vec![],
            assets: vec![],
            toolchain: None,
            duration,
        }
    }

    /// Combined output, stderr last, as the tool printed it
    pub fn combined_output(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Everything a step can see of its job
pub struct StepContext<'a> {
    /// Checkout directory of the job
    pub workspace: &'a Path,
    /// Triggering push
    pub event: &'a PushEvent,
    /// Matrix entry of the job
    pub platform: &'a Platform,
    /// Access granted to the run
    pub permissions: Permissions,
    /// Workflow and step environment, resolved
    pub env: &'a HashMap<String, String>,
    /// Expression values scoped to the job
    pub expressions: &'a ExpressionContext,
    /// Toolchain installed by an earlier step
    pub toolchain: Option<&'a str>,
    /// Artifacts produced by earlier steps
    pub artifacts: &'a [PathBuf],
}

/// Trait for step executors
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute a step
    ///
    /// A tool that runs and exits non-zero yields `Ok` with `success: false`;
    /// `Err` is reserved for failures with their own error type.
    async fn execute(
        &self,
        step: &Step,
        ctx: &StepContext<'_>,
    ) -> Result<ExecutionResult, TagrelError>;

    /// Check if the underlying tool is available
    async fn check_available(&self) -> Result<bool, TagrelError>;

    /// Validate step configuration
    fn validate_step(&self, step: &Step) -> Result<(), TagrelError>;
}

/// Run a prepared command to completion, capturing its output
///
/// The child is killed if the returned future is dropped, which is how a
/// cancelled run stops a step mid-flight.
pub(crate) async fn run_captured(
    tool: &str,
    mut cmd: Command,
    start: Instant,
) -> Result<ExecutionResult, TagrelError> {
    cmd.kill_on_drop(true);
    debug!(tool, command = ?cmd.as_std(), "Spawning");

    let output = cmd.output().await.map_err(|e| TagrelError::ToolExecutionFailed {
        tool: tool.to_string(),
        error: e.to_string(),
        help: Some(format!("'{}' may not be installed or not in PATH", tool)),
    })?;

    let duration = start.elapsed();
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if output.status.success() {
        Ok(ExecutionResult {
            stderr,
            ..ExecutionResult::success(stdout, duration, vec![])
        })
    } else {
        let exit_code = output.status.code().unwrap_or(-1);
        Ok(ExecutionResult {
            stdout,
            ..ExecutionResult::failure(stderr, exit_code, duration)
        })
    }
}

/// Create a standard executor setup with all built-in executors
pub fn create_default_executors(
    host: Arc<dyn ReleaseHost>,
) -> HashMap<StepKind, Box<dyn Executor>> {
    let mut executors: HashMap<StepKind, Box<dyn Executor>> = HashMap::new();

    executors.insert(StepKind::Checkout, Box::new(CheckoutExecutor::new()));
    executors.insert(StepKind::Toolchain, Box::new(ToolchainExecutor::new()));
    executors.insert(StepKind::Build, Box::new(BuildExecutor::new()));
    executors.insert(StepKind::Publish, Box::new(PublishExecutor::new(host)));
    executors.insert(StepKind::Shell, Box::new(ShellExecutor::new()));

    executors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_output_keeps_order() {
        let result = ExecutionResult {
            stdout: "Compiling app v0.1.0\n".into(),
            ..ExecutionResult::failure("error[E0308]: mismatched types\n".into(), 101, Duration::ZERO)
        };
        assert_eq!(
            result.combined_output(),
            "Compiling app v0.1.0\nerror[E0308]: mismatched types\n"
        );
    }

    #[tokio::test]
    async fn test_run_captured_reports_exit_code() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo out; echo err >&2; exit 3");

        let result = run_captured("sh", cmd, Instant::now()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_run_captured_missing_tool() {
        let cmd = Command::new("tagrel-no-such-tool");
        let err = run_captured("tagrel-no-such-tool", cmd, Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, TagrelError::ToolExecutionFailed { .. }));
    }
}
