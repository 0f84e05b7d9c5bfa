// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Error types
//!
//! Every fatal failure of a release run maps to one variant here, with a
//! diagnostic code and, where possible, a hint on how to recover.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for tagrel operations
pub type TagrelResult<T> = Result<T, TagrelError>;

/// Main error type for tagrel
#[derive(Error, Debug, Diagnostic)]
pub enum TagrelError {
    // ─────────────────────────────────────────────────────────────────────────
    // Tool Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Tool '{tool}' not found")]
    #[diagnostic(code(tagrel::tool_not_found), help("{suggestion}"))]
    ToolNotFound { tool: String, suggestion: String },

    #[error("Tool '{tool}' execution failed: {error}")]
    #[diagnostic(code(tagrel::tool_execution_failed))]
    ToolExecutionFailed {
        tool: String,
        error: String,
        #[help]
        help: Option<String>,
    },

    #[error("No executor registered for step kind: {kind}")]
    #[diagnostic(
        code(tagrel::executor_not_found),
        help("Available step kinds: checkout, toolchain, build, publish, shell")
    )]
    ExecutorNotFound { kind: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Workflow Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Workflow file not found: {path}")]
    #[diagnostic(
        code(tagrel::workflow_not_found),
        help("Create a workflow with 'tagrel init' or write .tagrel.yaml manually")
    )]
    WorkflowNotFound { path: PathBuf },

    #[error("Invalid workflow configuration: {reason}")]
    #[diagnostic(code(tagrel::invalid_workflow))]
    InvalidWorkflow {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Step '{step}' is invalid: {reason}")]
    #[diagnostic(code(tagrel::invalid_step))]
    InvalidStep { step: String, reason: String },

    #[error("Cannot resolve expression '{expression}': {reason}")]
    #[diagnostic(
        code(tagrel::unresolved_expression),
        help("Pass variables with --var NAME=VALUE or TAGREL_VAR_NAME")
    )]
    UnresolvedExpression { expression: String, reason: String },

    #[error("Invalid run state transition: {from} -> {to}")]
    #[diagnostic(code(tagrel::invalid_transition))]
    InvalidTransition { from: String, to: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Step Failures
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Checkout of '{git_ref}' failed")]
    #[diagnostic(code(tagrel::checkout_failed))]
    CheckoutFailed {
        git_ref: String,
        stderr: String,
        #[help]
        help: Option<String>,
    },

    #[error("Toolchain '{toolchain}' installation failed")]
    #[diagnostic(code(tagrel::toolchain_install_failed))]
    ToolchainInstallFailed {
        toolchain: String,
        stderr: String,
        #[help]
        help: Option<String>,
    },

    #[error("Compilation failed")]
    #[diagnostic(
        code(tagrel::compile_failed),
        help("Fix the build and push an amended tag to re-trigger the release")
    )]
    CompileFailed { stderr: String },

    #[error("Build artifact not found: {path}")]
    #[diagnostic(
        code(tagrel::artifact_missing),
        help("Check that BIN_NAME matches a binary target of the crate")
    )]
    ArtifactMissing { path: PathBuf },

    #[error("Permission denied: '{required}' access to repository contents is required")]
    #[diagnostic(
        code(tagrel::permission_denied),
        help("Grant 'contents: write' in the workflow permissions")
    )]
    PermissionDenied { required: String },

    #[error("Publishing to release '{tag}' failed: {message}")]
    #[diagnostic(code(tagrel::publish_failed))]
    PublishFailed {
        tag: String,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Step '{step}' failed with exit code {exit_code}")]
    #[diagnostic(code(tagrel::step_failed))]
    StepFailed {
        step: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Run cancelled: {reason}")]
    #[diagnostic(code(tagrel::cancelled))]
    Cancelled { reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // History Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Run '{id}' not found in history")]
    #[diagnostic(code(tagrel::run_not_found), help("List recorded runs with 'tagrel runs list'"))]
    RunNotFound { id: String },

    #[error("Run history error: {message}")]
    #[diagnostic(code(tagrel::history_error))]
    HistoryError { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(tagrel::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(tagrel::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(tagrel::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(tagrel::json_error))]
    Json { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(tagrel::glob_error))]
    GlobPattern { message: String },
}

impl From<std::io::Error> for TagrelError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for TagrelError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for TagrelError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<glob::PatternError> for TagrelError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl TagrelError {
    /// Create a tool not found error with installation suggestion
    pub fn tool_not_found(tool: &str) -> Self {
        let suggestion = match tool {
            "git" => "Install git: https://git-scm.com/downloads".to_string(),
            "rustup" => "Install rustup: https://rustup.rs".to_string(),
            "cargo" => "Install a Rust toolchain with rustup: https://rustup.rs".to_string(),
            "gh" => "Install the GitHub CLI: https://cli.github.com".to_string(),
            _ => format!("Install {} and ensure it's in your PATH", tool),
        };

        Self::ToolNotFound {
            tool: tool.to_string(),
            suggestion,
        }
    }

    /// Failure category used in run reports
    pub fn category(&self) -> &'static str {
        match self {
            Self::CheckoutFailed { .. } => "checkout",
            Self::ToolchainInstallFailed { .. } => "toolchain",
            Self::CompileFailed { .. } | Self::ArtifactMissing { .. } => "compile",
            Self::PermissionDenied { .. } => "authorization",
            Self::PublishFailed { .. } => "publish",
            Self::Cancelled { .. } => "cancelled",
            Self::StepFailed { .. } => "step",
            Self::ToolNotFound { .. } | Self::ToolExecutionFailed { .. } => "tool",
            _ => "internal",
        }
    }

    /// Captured tool output attached to this failure, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::CheckoutFailed { stderr, .. }
            | Self::ToolchainInstallFailed { stderr, .. }
            | Self::CompileFailed { stderr }
            | Self::StepFailed { stderr, .. } => Some(stderr.as_str()),
            _ => None,
        }
    }

    /// Build a checkout failure with a hint derived from git's output
    pub fn checkout_failed(git_ref: &str, stderr: String) -> Self {
        let help = if stderr.contains("not found in upstream") {
            Some(format!("The tag '{}' does not exist in the repository", git_ref))
        } else if stderr.contains("does not appear to be a git repository") {
            Some("Check the --repository path or URL".to_string())
        } else {
            None
        };

        Self::CheckoutFailed {
            git_ref: git_ref.to_string(),
            stderr,
            help,
        }
    }

    /// Build a publish failure with a hint derived from the host's output
    pub fn publish_failed(tag: &str, message: String) -> Self {
        let help = if message.contains("HTTP 401") || message.contains("authentication") {
            Some("Authenticate the GitHub CLI with 'gh auth login' or set GH_TOKEN".to_string())
        } else if message.contains("HTTP 403") {
            Some("The token lacks write access to repository contents".to_string())
        } else {
            None
        };

        Self::PublishFailed {
            tag: tag.to_string(),
            message,
            help,
        }
    }
}
