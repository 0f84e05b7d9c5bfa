// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Workflow definition structures
//!
//! Defines the schema for .tagrel.yaml files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Template for the default concurrency group: one group per workflow and ref
pub const DEFAULT_CONCURRENCY_GROUP: &str = "${{ github.workflow }}-${{ github.ref }}";

/// Workflow definition from .tagrel.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    /// Workflow description
    #[serde(default)]
    pub description: Option<String>,

    /// Events that start a run
    #[serde(default)]
    pub on: TriggerConfig,

    /// Access granted to the run
    #[serde(default)]
    pub permissions: Permissions,

    /// Concurrency group policy
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Workflow environment, may reference `vars` and `github` contexts
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Build matrix and failure strategy
    #[serde(default)]
    pub strategy: Strategy,

    /// Where releases live
    #[serde(default)]
    pub release: ReleaseConfig,

    /// Steps in execution order
    pub steps: Vec<Step>,
}

impl Workflow {
    /// Load workflow from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, crate::TagrelError> {
        if !path.exists() {
            return Err(crate::TagrelError::WorkflowNotFound {
                path: path.to_path_buf(),
            });
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| crate::TagrelError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        Self::from_yaml(&content)
    }

    /// Parse workflow from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, crate::TagrelError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Serialize workflow to YAML
    pub fn to_yaml(&self) -> Result<String, crate::TagrelError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// The canonical release workflow: build on Windows, upload
    /// `<BIN_NAME>.exe` to the release named by the pushed `v*` tag.
    ///
    /// When `bin_name` is `None` the binary name is read from the `BIN_NAME`
    /// variable at run time.
    pub fn default_release(bin_name: Option<&str>) -> Self {
        let bin_value = bin_name
            .map(str::to_string)
            .unwrap_or_else(|| "${{ vars.BIN_NAME }}".to_string());

        Self {
            name: "release".into(),
            description: Some("Build and upload a release binary on version tags".into()),
            on: TriggerConfig::default(),
            permissions: Permissions { contents: Access::Write },
            concurrency: ConcurrencyConfig::default(),
            env: HashMap::from([("BIN_NAME".to_string(), bin_value)]),
            strategy: Strategy::default(),
            release: ReleaseConfig::default(),
            steps: vec![
                Step::new("Checkout", Action::Checkout { submodules: false, fetch_depth: 1 }),
                Step::new(
                    "Install toolchain",
                    Action::Toolchain {
                        toolchain: default_toolchain(),
                        components: vec![],
                    },
                ),
                Step::new(
                    "Build",
                    Action::Build {
                        release: true,
                        verbose: true,
                        flags: vec![],
                    },
                ),
                Step::new("Upload release asset", Action::Publish { files: vec![] }),
            ],
        }
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Get all step names
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Trigger configuration (`on:`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Push trigger
    #[serde(default)]
    pub push: PushTrigger,
}

/// Push trigger filters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushTrigger {
    /// Tag globs; a push runs the workflow when its tag matches any of them
    #[serde(default = "default_tag_patterns")]
    pub tags: Vec<String>,
}

impl Default for PushTrigger {
    fn default() -> Self {
        Self {
            tags: default_tag_patterns(),
        }
    }
}

fn default_tag_patterns() -> Vec<String> {
    vec!["v*".to_string()]
}

/// Token permissions granted to the run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permissions {
    /// Access to repository contents (releases included)
    #[serde(default)]
    pub contents: Access,
}

/// Access level
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    None,
    #[default]
    Read,
    Write,
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Concurrency group policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Group key template
    #[serde(default = "default_group")]
    pub group: String,

    /// Cancel the in-flight run of the same group instead of queuing
    #[serde(default = "default_true")]
    pub cancel_in_progress: bool,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            group: default_group(),
            cancel_in_progress: true,
        }
    }
}

fn default_group() -> String {
    DEFAULT_CONCURRENCY_GROUP.to_string()
}

fn default_true() -> bool {
    true
}

/// Matrix and failure strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    /// Cancel remaining matrix jobs once one fails
    #[serde(default = "default_true")]
    pub fail_fast: bool,

    /// One job per entry, each running the full step list
    #[serde(default = "default_matrix")]
    pub matrix: Vec<Platform>,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            fail_fast: true,
            matrix: default_matrix(),
        }
    }
}

fn default_matrix() -> Vec<Platform> {
    vec![Platform {
        os: Os::Windows,
        target: None,
    }]
}

/// A matrix entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Platform {
    /// Runner operating system
    pub os: Os,

    /// Target triple for cross builds; `None` builds for the host
    #[serde(default)]
    pub target: Option<String>,
}

impl Platform {
    /// Display label, e.g. `windows` or `linux (aarch64-unknown-linux-gnu)`
    pub fn label(&self) -> String {
        match &self.target {
            Some(target) => format!("{} ({})", self.os, target),
            None => self.os.to_string(),
        }
    }

    /// Executable suffix of binaries built for this entry
    pub fn exe_suffix(&self) -> &'static str {
        let windows = match &self.target {
            Some(target) => target.contains("windows"),
            None => self.os == Os::Windows,
        };

        if windows {
            ".exe"
        } else {
            ""
        }
    }

    /// Whether this entry can build on the current host
    ///
    /// Entries with an explicit target are cross builds and run anywhere.
    pub fn matches_host(&self) -> bool {
        self.target.is_some() || Os::host() == Some(self.os)
    }

    /// Cargo's output directory for `profile` (`release` or `debug`)
    pub fn output_dir(&self, workspace: &Path, profile: &str) -> PathBuf {
        let mut dir = workspace.join("target");
        if let Some(target) = &self.target {
            dir.push(target);
        }
        dir.join(profile)
    }

    /// Cargo's release output directory for this entry
    pub fn release_dir(&self, workspace: &Path) -> PathBuf {
        self.output_dir(workspace, "release")
    }

    /// Path of the build artifact named `bin_name`
    pub fn artifact_path(&self, workspace: &Path, bin_name: &str) -> PathBuf {
        self.release_dir(workspace)
            .join(format!("{}{}", bin_name, self.exe_suffix()))
    }
}

/// Runner operating systems
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Linux,
    Macos,
}

impl Os {
    /// The operating system tagrel is running on
    pub fn host() -> Option<Self> {
        if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else if cfg!(target_os = "macos") {
            Some(Self::Macos)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::Linux => write!(f, "linux"),
            Self::Macos => write!(f, "macos"),
        }
    }
}

/// Release host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// Host kind
    #[serde(default)]
    pub host: ReleaseHostKind,

    /// Root directory for the local host
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Release host kinds
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseHostKind {
    /// GitHub releases through the `gh` CLI
    #[default]
    Github,
    /// Releases as directories on the local filesystem
    Local,
}

/// A single workflow step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Step name (must be unique within the workflow)
    pub name: String,

    /// Step description
    #[serde(default)]
    pub description: Option<String>,

    /// What the step does
    pub action: Action,

    /// Environment variables for this step
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Step {
    /// Create a step with no description or extra environment
    pub fn new(name: &str, action: Action) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            action,
            env: HashMap::new(),
        }
    }

    /// Get the kind of this step
    pub fn kind(&self) -> StepKind {
        match &self.action {
            Action::Checkout { .. } => StepKind::Checkout,
            Action::Toolchain { .. } => StepKind::Toolchain,
            Action::Build { .. } => StepKind::Build,
            Action::Publish { .. } => StepKind::Publish,
            Action::Shell { .. } => StepKind::Shell,
        }
    }
}

/// Step actions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    /// Clone the repository at the pushed tag
    Checkout {
        /// Clone nested submodules too
        #[serde(default)]
        submodules: bool,

        /// History depth; 0 clones everything
        #[serde(default = "default_fetch_depth")]
        fetch_depth: u32,
    },

    /// Install a Rust toolchain
    Toolchain {
        /// Channel or version
        #[serde(default = "default_toolchain")]
        toolchain: String,

        /// Extra rustup components
        #[serde(default)]
        components: Vec<String>,
    },

    /// Compile the binary
    Build {
        /// Optimized build
        #[serde(default = "default_true")]
        release: bool,

        /// Verbose compiler diagnostics
        #[serde(default = "default_true")]
        verbose: bool,

        /// Additional cargo flags
        #[serde(default)]
        flags: Vec<String>,
    },

    /// Upload files to the release of the pushed tag
    Publish {
        /// Files to upload; empty uploads the build artifact
        #[serde(default)]
        files: Vec<String>,
    },

    /// Shell command
    Shell {
        /// Shell command to run
        command: String,

        /// Shell to use (bash, sh, etc.)
        #[serde(default = "default_shell")]
        shell: String,
    },
}

fn default_fetch_depth() -> u32 {
    1
}

fn default_toolchain() -> String {
    "stable".to_string()
}

fn default_shell() -> String {
    "bash".to_string()
}

/// Step kinds, one executor each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Checkout,
    Toolchain,
    Build,
    Publish,
    Shell,
}

impl StepKind {
    /// The four steps every release workflow runs, in order
    pub const CORE: [StepKind; 4] = [Self::Checkout, Self::Toolchain, Self::Build, Self::Publish];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checkout => "checkout",
            Self::Toolchain => "toolchain",
            Self::Build => "build",
            Self::Publish => "publish",
            Self::Shell => "shell",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
