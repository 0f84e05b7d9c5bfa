// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Watch command - run on every new or moved tag
//!
//! Watches a local repository's refs. Each debounced change is diffed against
//! the previous tag snapshot; a tag that appeared or now points at another
//! commit is handled as a push of that tag.

use colored::Colorize;
use miette::Result;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::run::{build_executor, run_options};
use super::validate::load_valid;
use super::ExecArgs;
use crate::workflow::{PushEvent, RunOutcome};

/// Tag ref name to the object it points at
type TagSnapshot = HashMap<String, String>;

/// Run the watch command
pub async fn run(
    workflow_path: PathBuf,
    repository: PathBuf,
    debounce_ms: u64,
    exec: ExecArgs,
    verbose: bool,
) -> Result<()> {
    let workflow = load_valid(&workflow_path, verbose)?;

    let repository = repository.canonicalize().map_err(|e| {
        miette::miette!("Repository '{}' not found: {}", repository.display(), e)
    })?;
    let git_dir = repository.join(".git");
    if !git_dir.is_dir() {
        return Err(miette::miette!(
            "'{}' is not a git working tree (no .git directory)",
            repository.display()
        ));
    }

    let repo = repository.to_string_lossy().to_string();
    let executor = Arc::new(build_executor(&workflow, &repo, &exec)?);
    let workflow = Arc::new(workflow);
    let options = Arc::new(run_options(&exec, false, verbose));

    let mut snapshot = tag_snapshot(&repository).await?;

    println!("{}", "Starting watch mode...".bold());
    println!(
        "Watching {} ({} tags, debounce: {}ms)",
        repository.display(),
        snapshot.len(),
        debounce_ms
    );
    println!("Press {} to exit.", "Ctrl+C".cyan());
    println!();

    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();

    let handler = move |res: DebounceEventResult| {
        let _ = tx.send(res);
    };
    let mut debouncer = new_debouncer(Duration::from_millis(debounce_ms), handler)
        .map_err(|e| miette::miette!("Failed to create file watcher: {}", e))?;

    // Loose tags live under refs/, packed ones in .git/packed-refs
    debouncer
        .watcher()
        .watch(&git_dir.join("refs"), RecursiveMode::Recursive)
        .map_err(|e| miette::miette!("Failed to start watching: {}", e))?;
    debouncer
        .watcher()
        .watch(&git_dir, RecursiveMode::NonRecursive)
        .map_err(|e| miette::miette!("Failed to start watching: {}", e))?;

    let mut runs = JoinSet::new();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    eprintln!("{}", "Watcher stopped".red());
                    break;
                };

                let events = match event {
                    Ok(events) => events,
                    Err(e) => {
                        eprintln!("{}: {:?}", "Watch error".red(), e);
                        continue;
                    }
                };

                let relevant = events.iter().any(|e| {
                    matches!(e.kind, DebouncedEventKind::Any) && touches_tags(&e.path)
                });
                if !relevant {
                    continue;
                }

                let current = match tag_snapshot(&repository).await {
                    Ok(current) => current,
                    Err(e) => {
                        eprintln!("{}: {}", "Failed to read tags".red(), e);
                        continue;
                    }
                };

                for git_ref in pushed_tags(&snapshot, &current) {
                    println!();
                    println!("{}", "─".repeat(50).dimmed());
                    println!("{}: {}", "Tag pushed".yellow(), git_ref);

                    let executor = Arc::clone(&executor);
                    let workflow = Arc::clone(&workflow);
                    let options = Arc::clone(&options);
                    let event = PushEvent::new(&git_ref, &repo);

                    runs.spawn(async move {
                        match executor.execute(&workflow, &event, &options).await {
                            Ok(RunOutcome::Skipped { reason, .. }) => {
                                println!("  {} Skipped: {}", "○".dimmed(), reason);
                            }
                            Ok(_) => {}
                            Err(e) => eprintln!("{}: {}", "Run error".red(), e),
                        }
                    });
                }

                snapshot = current;
            }
            Some(finished) = runs.join_next(), if !runs.is_empty() => {
                if let Err(e) = finished {
                    warn!(error = %e, "Run task ended abnormally");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "Stopping: cancelling active runs...".yellow());
                executor.gate().cancel_all();
                break;
            }
        }
    }

    // Let cancelled runs clean up their workspaces and record themselves
    while runs.join_next().await.is_some() {}

    Ok(())
}

/// Whether a changed path can affect the tag set
fn touches_tags(path: &Path) -> bool {
    let path = path.to_string_lossy();
    path.contains("refs/tags") || path.contains("refs\\tags") || path.ends_with("packed-refs")
}

/// Current tags of `repository`
async fn tag_snapshot(repository: &Path) -> Result<TagSnapshot> {
    let git = which::which("git").map_err(|_| crate::errors::TagrelError::tool_not_found("git"))?;

    let output = Command::new(git)
        .arg("-C")
        .arg(repository)
        .args(["for-each-ref", "--format=%(refname) %(objectname)", "refs/tags"])
        .output()
        .await
        .map_err(|e| miette::miette!("Failed to run git: {}", e))?;

    if !output.status.success() {
        return Err(miette::miette!(
            "git for-each-ref failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let snapshot = parse_snapshot(&String::from_utf8_lossy(&output.stdout));
    debug!(tags = snapshot.len(), "Read tag snapshot");
    Ok(snapshot)
}

fn parse_snapshot(output: &str) -> TagSnapshot {
    output
        .lines()
        .filter_map(|line| line.split_once(' '))
        .map(|(name, object)| (name.to_string(), object.trim().to_string()))
        .collect()
}

/// Tags that are new in `current` or point elsewhere than in `previous`,
/// in name order
fn pushed_tags(previous: &TagSnapshot, current: &TagSnapshot) -> Vec<String> {
    let mut pushed: Vec<String> = current
        .iter()
        .filter(|(name, object)| previous.get(*name) != Some(*object))
        .map(|(name, _)| name.clone())
        .collect();
    pushed.sort();
    pushed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshot() {
        let snapshot = parse_snapshot("refs/tags/v1.0.0 abc123\nrefs/tags/v1.1.0 def456\n");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["refs/tags/v1.1.0"], "def456");
    }

    #[test]
    fn test_new_and_moved_tags_are_pushed() {
        let previous = parse_snapshot("refs/tags/v1.0.0 aaa\nrefs/tags/v1.1.0 bbb\n");
        let current = parse_snapshot(
            "refs/tags/v1.0.0 aaa\nrefs/tags/v1.1.0 ccc\nrefs/tags/v1.2.0 ddd\n",
        );

        assert_eq!(
            pushed_tags(&previous, &current),
            vec!["refs/tags/v1.1.0", "refs/tags/v1.2.0"]
        );
    }

    #[test]
    fn test_deleted_tag_is_not_pushed() {
        let previous = parse_snapshot("refs/tags/v1.0.0 aaa\n");
        assert!(pushed_tags(&previous, &TagSnapshot::new()).is_empty());
    }

    #[test]
    fn test_touches_tags() {
        assert!(touches_tags(Path::new("/repo/.git/refs/tags/v1.0.0")));
        assert!(touches_tags(Path::new("/repo/.git/packed-refs")));
        assert!(!touches_tags(Path::new("/repo/.git/refs/heads/main")));
    }
}
