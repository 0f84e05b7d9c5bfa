// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for tagrel.

pub mod init;
pub mod run;
pub mod runs;
pub mod trigger;
pub mod validate;
pub mod watch;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::workflow::parse_var;

/// Default workflow file
pub const DEFAULT_WORKFLOW_FILE: &str = ".tagrel.yaml";

/// Tag-triggered release builder
///
/// Checks out a pushed version tag, builds the binary and uploads it to the
/// tag's release.
#[derive(Parser, Debug)]
#[clap(
    name = "tagrel",
    version,
    about = "Tag-triggered release builder: checkout, toolchain, build and publish",
    long_about = None,
    after_help = "Examples:\n\
        tagrel init --bin-name app          Write a release workflow\n\
        tagrel trigger v1.2.0               Check whether a ref starts a run\n\
        tagrel run --ref v1.2.0             Build and publish the release for a tag\n\
        tagrel watch                        Run on every new or moved version tag\n\n\
        See 'tagrel <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a release workflow file
    Init {
        /// Binary to publish (defaults to the BIN_NAME variable at run time)
        #[clap(short, long)]
        bin_name: Option<String>,

        /// Overwrite an existing workflow file
        #[clap(short, long)]
        force: bool,

        /// Workflow file
        #[clap(short, long, env = "TAGREL_WORKFLOW", default_value = DEFAULT_WORKFLOW_FILE)]
        workflow: PathBuf,
    },

    /// Validate workflow configuration
    Validate {
        /// Workflow file to validate
        #[clap(env = "TAGREL_WORKFLOW", default_value = DEFAULT_WORKFLOW_FILE)]
        workflow: PathBuf,
    },

    /// Show whether a pushed ref would start a run
    Trigger {
        /// Tag or full ref, e.g. v1.2.0 or refs/tags/v1.2.0
        git_ref: String,

        /// Workflow file
        #[clap(short, long, env = "TAGREL_WORKFLOW", default_value = DEFAULT_WORKFLOW_FILE)]
        workflow: PathBuf,
    },

    /// Handle a tag push: build and publish its release
    Run(RunArgs),

    /// Watch a repository and run on every new or moved tag
    Watch {
        /// Workflow file
        #[clap(short, long, env = "TAGREL_WORKFLOW", default_value = DEFAULT_WORKFLOW_FILE)]
        workflow: PathBuf,

        /// Repository to watch
        #[clap(short, long, default_value = ".")]
        repository: PathBuf,

        /// Debounce delay in milliseconds
        #[clap(long, default_value = "500")]
        debounce: u64,

        #[clap(flatten)]
        exec: ExecArgs,
    },

    /// Run history
    Runs {
        #[clap(subcommand)]
        action: RunsAction,
    },
}

/// Arguments of `tagrel run`
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Pushed tag or full ref
    #[clap(short = 'r', long = "ref", value_name = "REF")]
    pub git_ref: String,

    /// Repository to check out: a local path, a clone URL or owner/name
    #[clap(long, default_value = ".")]
    pub repository: String,

    /// Workflow file
    #[clap(short, long, env = "TAGREL_WORKFLOW", default_value = DEFAULT_WORKFLOW_FILE)]
    pub workflow: PathBuf,

    /// Print the plan without running anything
    #[clap(long)]
    pub dry_run: bool,

    /// Output format
    #[clap(short, long, default_value = "text")]
    pub format: OutputFormat,

    #[clap(flatten)]
    pub exec: ExecArgs,
}

/// Options shared by commands that execute runs
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ExecArgs {
    /// External variable, NAME=VALUE (repeatable; also TAGREL_VAR_NAME)
    #[clap(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Publish into this directory instead of the configured release host
    #[clap(long, env = "TAGREL_RELEASE_DIR", value_name = "DIR")]
    pub release_dir: Option<PathBuf>,

    /// Root directory for job workspaces
    #[clap(long, env = "TAGREL_WORKSPACE", value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Keep job workspaces after the run
    #[clap(long)]
    pub keep_workspace: bool,
}

/// Run history actions
#[derive(Subcommand, Debug, Clone)]
pub enum RunsAction {
    /// List recorded runs, newest first
    List {
        /// Show at most this many runs
        #[clap(short, long)]
        limit: Option<usize>,
    },

    /// Show one run
    Show {
        /// Run id or unique prefix
        id: String,

        /// Output format
        #[clap(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show history statistics
    Stats,

    /// Forget all recorded runs
    Clear {
        /// Skip confirmation
        #[clap(short, long)]
        yes: bool,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::parse_from([
            "tagrel", "run", "--ref", "v1.0.0", "--var", "BIN_NAME=app", "--dry-run",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.git_ref, "v1.0.0");
                assert_eq!(args.exec.vars, vec![("BIN_NAME".to_string(), "app".to_string())]);
                assert!(args.dry_run);
                assert_eq!(args.format, OutputFormat::Text);
            }
            other => panic!("Expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_var_is_rejected() {
        assert!(Cli::try_parse_from(["tagrel", "run", "--ref", "v1", "--var", "novalue"]).is_err());
    }
}
