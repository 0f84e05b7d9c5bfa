// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Trigger command - show whether a pushed ref starts a run

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::workflow::{PushEvent, TriggerFilter, Workflow};

/// Run the trigger command
///
/// A non-matching ref is not an error; the command only reports it.
pub async fn run(workflow_path: PathBuf, git_ref: String, verbose: bool) -> Result<()> {
    let workflow = Workflow::from_file(&workflow_path)?;
    let filter = TriggerFilter::for_workflow(&workflow)?;
    let event = PushEvent::new(&git_ref, ".");

    if filter.matches(&event) {
        println!(
            "  {} {} triggers workflow '{}'",
            "✓".green(),
            event.git_ref.bold(),
            workflow.name
        );
    } else {
        println!(
            "  {} {} does not trigger workflow '{}'",
            "○".dimmed(),
            event.git_ref.bold(),
            workflow.name
        );
    }

    if verbose {
        println!();
        println!("{}:", "Tag patterns".bold());
        for pattern in &workflow.on.push.tags {
            println!("  • {}", pattern);
        }
    }

    Ok(())
}
