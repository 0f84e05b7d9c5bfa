// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Run reports
//!
//! What a run did, serialized into the run history and `--format json`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

use crate::errors::TagrelError;
use crate::workflow::RunState;

/// Outcome of handling one push event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The ref did not match the trigger; nothing ran
    Skipped { git_ref: String, reason: String },
    /// Dry run: the plan was printed, nothing ran
    Planned { run_id: String, group: String },
    /// The run went through the gate and reached a terminal state
    Finished(RunReport),
}

impl RunOutcome {
    /// Whether the outcome counts as success for the exit status
    pub fn is_success(&self) -> bool {
        match self {
            Self::Skipped { .. } | Self::Planned { .. } => true,
            Self::Finished(report) => report.state == RunState::Published,
        }
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Self::Finished(report) => Some(report),
            _ => None,
        }
    }
}

/// Record of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub workflow: String,
    pub git_ref: String,
    pub repository: String,
    /// Resolved concurrency group key
    pub group: String,
    /// Aggregate terminal state
    pub state: RunState,
    pub jobs: Vec<JobReport>,
    pub started_at: SystemTime,
    pub duration_ms: u64,
}

impl RunReport {
    /// Aggregate job states into the run state
    ///
    /// A superseded run is `Cancelled`; otherwise any failed job, or no job
    /// able to run at all, fails the run.
    pub fn aggregate(jobs: &[JobReport], superseded: bool) -> RunState {
        if superseded {
            return RunState::Cancelled;
        }

        let ran: Vec<&JobReport> = jobs.iter().filter(|j| !j.skipped).collect();
        if ran.is_empty() || ran.iter().any(|j| j.state != RunState::Published) {
            RunState::Failed
        } else {
            RunState::Published
        }
    }

    /// First job failure, if any
    pub fn failure(&self) -> Option<&FailureInfo> {
        self.jobs.iter().find_map(|j| j.error.as_ref())
    }

    /// All assets published by the run
    pub fn assets(&self) -> impl Iterator<Item = &PublishedAsset> {
        self.jobs.iter().flat_map(|j| j.assets.iter())
    }
}

/// Record of one matrix job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    /// Matrix entry label
    pub platform: String,
    pub state: RunState,
    /// The entry cannot build on this host
    #[serde(default)]
    pub skipped: bool,
    pub steps: Vec<StepReport>,
    pub artifact: Option<PathBuf>,
    pub assets: Vec<PublishedAsset>,
    pub error: Option<FailureInfo>,
}

impl JobReport {
    /// A job that never started
    pub fn not_started(platform: String, state: RunState, skipped: bool) -> Self {
        Self {
            platform,
            state,
            skipped,
            steps: vec![],
            artifact: None,
            assets: vec![],
            error: None,
        }
    }
}

/// Record of one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub kind: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

/// Serializable summary of a run failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureInfo {
    /// Failure taxonomy bucket (toolchain, compile, authorization, ...)
    pub category: String,
    pub message: String,
    /// Verbatim tool output
    pub output: Option<String>,
}

impl From<&TagrelError> for FailureInfo {
    fn from(error: &TagrelError) -> Self {
        Self {
            category: error.category().to_string(),
            message: error.to_string(),
            output: error.output().map(str::to_string),
        }
    }
}

/// An asset attached to a release
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishedAsset {
    pub tag: String,
    pub name: String,
    pub size: u64,
    /// BLAKE3 digest, hex
    pub digest: String,
    /// Where the host put it
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(state: RunState, skipped: bool) -> JobReport {
        JobReport::not_started("windows".into(), state, skipped)
    }

    #[test]
    fn test_aggregate_published() {
        let jobs = vec![job(RunState::Published, false), job(RunState::Gated, true)];
        assert_eq!(RunReport::aggregate(&jobs, false), RunState::Published);
    }

    #[test]
    fn test_aggregate_failure_wins_over_fail_fast_cancellation() {
        let jobs = vec![job(RunState::Failed, false), job(RunState::Cancelled, false)];
        assert_eq!(RunReport::aggregate(&jobs, false), RunState::Failed);
    }

    #[test]
    fn test_aggregate_superseded() {
        let jobs = vec![job(RunState::Published, false)];
        assert_eq!(RunReport::aggregate(&jobs, true), RunState::Cancelled);
    }

    #[test]
    fn test_aggregate_nothing_ran() {
        let jobs = vec![job(RunState::Gated, true)];
        assert_eq!(RunReport::aggregate(&jobs, false), RunState::Failed);
    }

    #[test]
    fn test_failure_info_keeps_output() {
        let err = TagrelError::CompileFailed {
            stderr: "error: expected `;`".into(),
        };
        let info = FailureInfo::from(&err);
        assert_eq!(info.category, "compile");
        assert_eq!(info.output.as_deref(), Some("error: expected `;`"));
    }
}
