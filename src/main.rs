// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! tagrel - Tag-triggered release builder
//!
//! Builds a binary for every pushed version tag and publishes it to the tag's release.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tagrel::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "tagrel=debug" } else { "tagrel=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Init {
            bin_name,
            force,
            workflow,
        } => tagrel::cli::init::run(workflow, bin_name, force, cli.verbose).await,
        Commands::Validate { workflow } => tagrel::cli::validate::run(workflow, cli.verbose).await,
        Commands::Trigger { git_ref, workflow } => {
            tagrel::cli::trigger::run(workflow, git_ref, cli.verbose).await
        }
        Commands::Run(args) => tagrel::cli::run::run(args, cli.verbose).await,
        Commands::Watch {
            workflow,
            repository,
            debounce,
            exec,
        } => tagrel::cli::watch::run(workflow, repository, debounce, exec, cli.verbose).await,
        Commands::Runs { action } => tagrel::cli::runs::run(action, cli.verbose).await,
    }
}
