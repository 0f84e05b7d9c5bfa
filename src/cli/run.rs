// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Run command - handle one tag push

use colored::Colorize;
use miette::Result;
use std::path::Path;
use std::sync::Arc;

use super::validate::load_valid;
use super::{ExecArgs, OutputFormat, RunArgs};
use crate::errors::{RecoverySuggestion, TagrelError};
use crate::executors::create_default_executors;
use crate::history::{FilesystemRunStore, DEFAULT_HISTORY_DIR};
use crate::release::host_for;
use crate::workflow::workspace::default_root;
use crate::workflow::{
    collect_vars, PushEvent, RunExecutor, RunOptions, RunOutcome, TriggerFilter, Workflow,
};

/// Run the run command
pub async fn run(args: RunArgs, verbose: bool) -> Result<()> {
    let workflow = load_valid(&args.workflow, verbose)?;
    let repository = resolve_repository(&args.repository);
    let event = PushEvent::new(&args.git_ref, &repository);

    let executor = build_executor(&workflow, &repository, &args.exec)?;

    // Tools only matter once the ref actually triggers a run
    let triggered = TriggerFilter::for_workflow(&workflow)?.matches(&event);
    if triggered && !args.dry_run {
        let missing = executor.check_tools(&workflow).await;
        if !missing.is_empty() {
            eprintln!("{}", "Missing required tools:".red().bold());
            for kind in &missing {
                eprintln!("  {} {} step", "✗".red(), kind);
                let tool = match kind.as_str() {
                    "checkout" => "git",
                    "toolchain" => "rustup",
                    "build" => "cargo",
                    _ => "sh",
                };
                eprint!("{}", RecoverySuggestion::install_tool(tool));
            }
            return Err(miette::miette!("Required tools are not installed"));
        }
    }

    let mut options = run_options(&args.exec, args.dry_run, verbose);
    options.quiet = args.format == OutputFormat::Json;

    let outcome = executor.execute(&workflow, &event, &options).await?;

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&outcome).map_err(TagrelError::from)?;
            println!("{}", json);
        }
        OutputFormat::Text => print_outcome(&outcome),
    }

    match &outcome {
        RunOutcome::Finished(report) if !outcome.is_success() => Err(miette::miette!(
            "Run {} for {} ended {}",
            report.run_id,
            report.git_ref,
            report.state
        )),
        _ => Ok(()),
    }
}

/// Executor wired with the default step executors, the release host and the
/// run history of the current directory
pub(crate) fn build_executor(
    workflow: &Workflow,
    repository: &str,
    exec: &ExecArgs,
) -> Result<RunExecutor> {
    let host = host_for(&workflow.release, repository, exec.release_dir.as_deref())?;

    let cwd = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;
    let store = FilesystemRunStore::new(cwd.join(DEFAULT_HISTORY_DIR))?;

    Ok(RunExecutor::new()
        .with_executors(create_default_executors(host))
        .with_store(Arc::new(store)))
}

/// Run options from command-line arguments and the `TAGREL_VAR_*` environment
pub(crate) fn run_options(exec: &ExecArgs, dry_run: bool, verbose: bool) -> RunOptions {
    RunOptions {
        dry_run,
        keep_workspace: exec.keep_workspace,
        workspace_root: exec.workspace.clone().unwrap_or_else(default_root),
        vars: collect_vars(&exec.vars),
        verbose,
        quiet: false,
    }
}

/// Local repositories are cloned from an absolute path, since the job
/// workspace lives elsewhere
pub(crate) fn resolve_repository(repository: &str) -> String {
    let path = Path::new(repository);
    if path.exists() {
        if let Ok(absolute) = path.canonicalize() {
            return absolute.to_string_lossy().to_string();
        }
    }
    repository.to_string()
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Skipped { reason, .. } => {
            println!("  {} Skipped: {}", "○".dimmed(), reason);
        }
        RunOutcome::Planned { run_id, .. } => {
            println!("{}", format!("Dry run {}: nothing was executed", run_id).dimmed());
        }
        RunOutcome::Finished(report) => {
            if let Some(failure) = report.failure() {
                println!();
                println!("  {} {}", "Failure:".bold(), failure.category);
            }
            println!("  {} tagrel runs show {}", "Details:".dimmed(), report.run_id);
        }
    }
}
