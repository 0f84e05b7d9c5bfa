// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Validate command - check workflow configuration

use colored::Colorize;
use miette::Result;
use std::path::{Path, PathBuf};

use crate::workflow::{Workflow, WorkflowValidator};

/// Run the validate command
pub async fn run(workflow_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating workflow...".bold());
    println!();

    let workflow = match Workflow::from_file(&workflow_path) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("  {} Failed to load workflow", "✗".red());
            eprintln!();
            return Err(e.into());
        }
    };

    println!("  {} Workflow file is valid YAML", "✓".green());

    let validation = WorkflowValidator::validate(&workflow)?;

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Workflow summary".bold());
        println!("  Name: {}", workflow.name);
        println!("  Tags: {}", workflow.on.push.tags.join(", "));
        println!("  Group: {}", workflow.concurrency.group);
        println!(
            "  Matrix: {}",
            workflow
                .strategy
                .matrix
                .iter()
                .map(|p| p.label())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("  Steps: {}", workflow.steps.len());
        for step in &workflow.steps {
            println!("    - {} ({})", step.name, step.kind().to_string().dimmed());
        }
    }

    println!();

    if !validation.is_valid() {
        return Err(miette::miette!("Workflow validation failed"));
    }

    if validation.has_warnings() {
        println!("{}", "Workflow is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Workflow is valid!".green().bold());
    }
    Ok(())
}

/// Load a workflow and refuse to go on if it is invalid
pub(crate) fn load_valid(workflow_path: &Path, verbose: bool) -> Result<Workflow> {
    let workflow = Workflow::from_file(workflow_path)?;
    let validation = WorkflowValidator::validate(&workflow)?;

    if !validation.is_valid() {
        eprintln!("{}", "Workflow validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(miette::miette!("Workflow configuration is invalid"));
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Workflow warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    Ok(workflow)
}
