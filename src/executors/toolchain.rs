// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Toolchain executor
//!
//! Installs a Rust toolchain with rustup. Installing an already present
//! toolchain is a no-op, so the step is safe to repeat.

use async_trait::async_trait;
use std::time::Instant;
use tokio::process::Command;

use super::{run_captured, ExecutionResult, Executor, StepContext};
use crate::errors::TagrelError;
use crate::workflow::{Action, Platform, Step};

/// Toolchain executor
pub struct ToolchainExecutor;

impl ToolchainExecutor {
    /// Create a new toolchain executor
    pub fn new() -> Self {
        Self
    }

    /// `rustup` arguments installing `toolchain` for `platform`
    fn install_args(toolchain: &str, components: &[String], platform: &Platform) -> Vec<String> {
        let mut args = vec![
            "toolchain".to_string(),
            "install".to_string(),
            toolchain.to_string(),
            "--profile".to_string(),
            "minimal".to_string(),
            "--no-self-update".to_string(),
        ];

        if let Some(target) = &platform.target {
            args.push("--target".into());
            args.push(target.clone());
        }

        for component in components {
            args.push("--component".into());
            args.push(component.clone());
        }

        args
    }
}

impl Default for ToolchainExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ToolchainExecutor {
    async fn execute(
        &self,
        step: &Step,
        ctx: &StepContext<'_>,
    ) -> Result<ExecutionResult, TagrelError> {
        let Action::Toolchain {
            toolchain,
            components,
        } = &step.action
        else {
            return Err(TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: "Expected toolchain action".to_string(),
            });
        };

        let rustup = which::which("rustup").map_err(|_| TagrelError::ToolchainInstallFailed {
            toolchain: toolchain.clone(),
            stderr: "rustup not found in PATH".to_string(),
            help: Some("Install rustup: https://rustup.rs".to_string()),
        })?;

        let start = Instant::now();
        let mut cmd = Command::new(rustup);
        cmd.args(Self::install_args(toolchain, components, ctx.platform));
        cmd.envs(ctx.env);

        let result = run_captured("rustup", cmd, start).await?;
        if !result.success {
            return Ok(result);
        }

        Ok(ExecutionResult {
            toolchain: Some(toolchain.clone()),
            ..result
        })
    }

    async fn check_available(&self) -> Result<bool, TagrelError> {
        Ok(which::which("rustup").is_ok())
    }

    fn validate_step(&self, step: &Step) -> Result<(), TagrelError> {
        let Action::Toolchain { toolchain, .. } = &step.action else {
            return Err(TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: "Not a toolchain step".to_string(),
            });
        };

        if toolchain.trim().is_empty() {
            return Err(TagrelError::InvalidStep {
                step: step.name.clone(),
                reason: "Toolchain is empty".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Os;

    #[test]
    fn test_install_args_for_host_build() {
        let platform = Platform { os: Os::Windows, target: None };
        let args = ToolchainExecutor::install_args("stable", &[], &platform);
        assert_eq!(
            args,
            vec!["toolchain", "install", "stable", "--profile", "minimal", "--no-self-update"]
        );
    }

    #[test]
    fn test_install_args_with_target_and_components() {
        let platform = Platform {
            os: Os::Linux,
            target: Some("x86_64-pc-windows-gnu".into()),
        };
        let args = ToolchainExecutor::install_args("1.80.0", &["clippy".to_string()], &platform);
        assert!(args.windows(2).any(|w| w == ["--target", "x86_64-pc-windows-gnu"]));
        assert!(args.windows(2).any(|w| w == ["--component", "clippy"]));
    }

    #[test]
    fn test_validate_empty_toolchain() {
        let step = Step::new(
            "Install",
            Action::Toolchain {
                toolchain: " ".into(),
                components: vec![],
            },
        );
        assert!(ToolchainExecutor::new().validate_step(&step).is_err());
    }
}
