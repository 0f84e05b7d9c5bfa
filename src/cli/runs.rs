// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Runs command - inspect the run history

use colored::Colorize;
use miette::Result;
use std::io::{self, Write};
use std::time::SystemTime;

use super::{OutputFormat, RunsAction};
use crate::errors::TagrelError;
use crate::history::{FilesystemRunStore, RunStore, DEFAULT_HISTORY_DIR};
use crate::utils::{format_duration_ms, print_header, print_section, state_label, state_mark};
use crate::workflow::RunReport;

/// Run the runs command
pub async fn run(action: RunsAction, verbose: bool) -> Result<()> {
    let working_dir = std::env::current_dir().map_err(|e| {
        miette::miette!("Failed to get current directory: {}", e)
    })?;

    let history_dir = working_dir.join(DEFAULT_HISTORY_DIR);
    let store = FilesystemRunStore::new(history_dir.clone())?;

    match action {
        RunsAction::List { limit } => {
            let runs = store.list().await?;

            print_header("Runs");
            if runs.is_empty() {
                println!("{}", "  No recorded runs.".dimmed());
                return Ok(());
            }

            let shown = limit.unwrap_or(runs.len());
            for report in runs.iter().take(shown) {
                println!(
                    "  {} {}  {:<20} {:<16} {:>8}  {}",
                    state_mark(report.state),
                    report.run_id,
                    report.git_ref.trim_start_matches("refs/tags/"),
                    state_label(report.state),
                    format_duration_ms(report.duration_ms),
                    format_age(report.started_at).dimmed()
                );
            }

            if runs.len() > shown {
                println!("{}", format!("  ... and {} more", runs.len() - shown).dimmed());
            }

            Ok(())
        }

        RunsAction::Show { id, format } => {
            let report = store
                .get(&id)
                .await?
                .ok_or(TagrelError::RunNotFound { id })?;

            match format {
                OutputFormat::Json => {
                    let json =
                        serde_json::to_string_pretty(&report).map_err(TagrelError::from)?;
                    println!("{}", json);
                }
                OutputFormat::Text => print_report(&report, verbose),
            }

            Ok(())
        }

        RunsAction::Stats => {
            let stats = store.stats().await?;

            print_header("Run History");
            println!("  Location:  {}", history_dir.display());
            println!("  Runs:      {}", stats.runs);
            println!("  Published: {}", stats.published.to_string().green());
            println!("  Failed:    {}", stats.failed.to_string().red());
            println!("  Cancelled: {}", stats.cancelled.to_string().yellow());
            println!("  Size:      {}", stats.formatted_size());

            if let Some(newest) = stats.newest_run {
                println!("  Newest:    {}", format_age(newest));
            }

            Ok(())
        }

        RunsAction::Clear { yes } => {
            let stats = store.stats().await?;

            if stats.runs == 0 {
                println!("{}", "Run history is already empty.".dimmed());
                return Ok(());
            }

            if !yes {
                print!(
                    "Forget {} recorded runs ({})? [y/N] ",
                    stats.runs,
                    stats.formatted_size()
                );
                io::stdout().flush().ok();

                let mut input = String::new();
                io::stdin().read_line(&mut input).ok();

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("{}", "Cancelled.".dimmed());
                    return Ok(());
                }
            }

            store.clear().await?;
            println!("{}", "Run history cleared.".green());

            Ok(())
        }
    }
}

fn print_report(report: &RunReport, verbose: bool) {
    print_header(&format!("Run {}", report.run_id));
    println!("  Workflow:   {}", report.workflow);
    println!("  Ref:        {}", report.git_ref);
    println!("  Repository: {}", report.repository);
    println!("  Group:      {}", report.group);
    println!("  State:      {}", state_label(report.state));
    println!("  Started:    {}", format_age(report.started_at));
    println!("  Duration:   {}", format_duration_ms(report.duration_ms));

    for job in &report.jobs {
        print_section(&format!("Job {}", job.platform));

        if job.skipped {
            println!("  {}", "skipped: cannot build on the recording host".dimmed());
            continue;
        }

        println!("  State: {}", state_label(job.state));
        for step in &job.steps {
            let mark = if step.success { "✓".green() } else { "✗".red() };
            let exit = step
                .exit_code
                .map(|code| format!(" exit {}", code))
                .unwrap_or_default();
            println!(
                "  {} {} ({}){}",
                mark,
                step.name,
                format_duration_ms(step.duration_ms),
                exit.dimmed()
            );
        }

        if let Some(artifact) = &job.artifact {
            println!("  Artifact: {}", artifact.display());
        }

        for asset in &job.assets {
            println!("  {} {} {}", "↑".green(), asset.name.bold(), asset.location.dimmed());
            if verbose {
                println!("      {} bytes, blake3 {}", asset.size, asset.digest);
            }
        }

        if let Some(error) = &job.error {
            println!();
            println!("  {} [{}] {}", "✗".red(), error.category, error.message);
            if let Some(output) = &error.output {
                println!("{}", output.trim_end());
            }
        }
    }
}

/// Age of a timestamp, e.g. `5m ago`
fn format_age(time: SystemTime) -> String {
    let Ok(duration) = time.elapsed() else {
        return "just now".to_string();
    };
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86400)
    }
}
