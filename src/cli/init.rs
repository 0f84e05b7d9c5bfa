// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Init command - write a release workflow

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::history::DEFAULT_HISTORY_DIR;
use crate::workflow::Workflow;

/// Run the init command
pub async fn run(
    workflow_path: PathBuf,
    bin_name: Option<String>,
    force: bool,
    verbose: bool,
) -> Result<()> {
    println!("{}", "Initializing release workflow...".bold());
    println!();

    if workflow_path.exists() && !force {
        return Err(miette::miette!(
            "{} already exists. Use --force to overwrite.",
            workflow_path.display()
        ));
    }

    let workflow = Workflow::default_release(bin_name.as_deref());
    let content = format!(
        "# tagrel release workflow\n\
         # Builds on every pushed tag matching the push patterns and uploads\n\
         # the binary to the tag's release.\n\n{}",
        workflow.to_yaml()?
    );

    std::fs::write(&workflow_path, content).map_err(|e| {
        miette::miette!("Failed to write {}: {}", workflow_path.display(), e)
    })?;

    println!("  {} Created {}", "✓".green(), workflow_path.display());

    println!();
    println!("{}", "Workflow initialized!".green().bold());
    println!();
    println!("Next steps:");
    if bin_name.is_none() {
        println!(
            "  1. Set the binary name with {} or {}",
            "--var BIN_NAME=<name>".cyan(),
            "TAGREL_VAR_BIN_NAME".cyan()
        );
    } else {
        println!("  1. Review {} (matrix, release host)", workflow_path.display().to_string().cyan());
    }
    println!("  2. Check it with {}", "tagrel validate".cyan());
    println!("  3. Release a tag with {}", "tagrel run --ref v0.1.0".cyan());
    println!();

    if verbose {
        println!("{}:", "Files".bold());
        println!("  {} - workflow definition", workflow_path.display());
        println!("  {}/ - run history (created on first run)", DEFAULT_HISTORY_DIR);
    }

    Ok(())
}
