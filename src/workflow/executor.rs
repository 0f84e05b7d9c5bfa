// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Run executor
//!
//! Takes a push event through trigger, concurrency gate and one job per
//! matrix entry, each job running the workflow steps in order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use colored::Colorize;
use tracing::{debug, info, warn};

use crate::concurrency::{CancelToken, ConcurrencyGate};
use crate::errors::{RecoverySuggestion, TagrelError};
use crate::executors::{ExecutionResult, Executor, StepContext};
use crate::history::{new_run_id, RunStore};
use crate::utils::{format_duration_ms, state_mark, step_spinner};
use crate::workflow::workspace::{default_root, Workspace};
use crate::workflow::{
    Action, ExpressionContext, FailureInfo, JobReport, Platform, PushEvent, RunOutcome,
    RunReport, RunState, Step, StepKind, StepReport, TriggerFilter, ValidationResult, Workflow,
    WorkflowValidator,
};

/// Run options
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Print the plan without gating or running anything
    pub dry_run: bool,
    /// Leave job workspaces on disk
    pub keep_workspace: bool,
    /// Where job workspaces are created
    pub workspace_root: PathBuf,
    /// External variables (`vars` context)
    pub vars: HashMap<String, String>,
    /// Print the output of successful steps too
    pub verbose: bool,
    /// No console output; logs and the returned outcome only
    pub quiet: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            keep_workspace: false,
            workspace_root: default_root(),
            vars: HashMap::new(),
            verbose: false,
            quiet: false,
        }
    }
}

/// A matrix job with every expression resolved
struct JobPlan {
    platform: Platform,
    expressions: ExpressionContext,
    /// Expression context of each step, in step order, with the step's own
    /// `env` merged over the workflow's
    steps: Vec<ExpressionContext>,
}

/// Run executor
pub struct RunExecutor {
    /// Registered executors by step kind
    executors: HashMap<StepKind, Box<dyn Executor>>,
    /// Concurrency groups, shared with other executors of the process
    gate: Arc<ConcurrencyGate>,
    /// Run history
    store: Option<Arc<dyn RunStore>>,
}

impl RunExecutor {
    /// Create an executor with no step executors registered
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
            gate: ConcurrencyGate::new(),
            store: None,
        }
    }

    /// Register an executor for a step kind
    pub fn register_executor(&mut self, kind: StepKind, executor: Box<dyn Executor>) {
        self.executors.insert(kind, executor);
    }

    /// Register a set of executors, e.g. from `create_default_executors`
    pub fn with_executors(mut self, executors: HashMap<StepKind, Box<dyn Executor>>) -> Self {
        self.executors.extend(executors);
        self
    }

    /// Share a concurrency gate
    pub fn with_gate(mut self, gate: Arc<ConcurrencyGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Record runs in a history store
    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The concurrency gate runs go through
    pub fn gate(&self) -> &Arc<ConcurrencyGate> {
        &self.gate
    }

    /// Handle one push event
    ///
    /// Returns `Err` only for problems found before the run entered its
    /// concurrency group (bad expressions, bad trigger globs). Everything
    /// after that is reported in the returned [`RunReport`].
    pub async fn execute(
        &self,
        workflow: &Workflow,
        event: &PushEvent,
        options: &RunOptions,
    ) -> Result<RunOutcome, TagrelError> {
        let start = Instant::now();
        let started_at = SystemTime::now();

        let filter = TriggerFilter::for_workflow(workflow)?;
        if !filter.matches(event) {
            let reason = format!(
                "'{}' does not match push tags [{}]",
                event.git_ref,
                workflow.on.push.tags.join(", ")
            );
            info!(git_ref = %event.git_ref, "Trigger did not match, skipping");
            return Ok(RunOutcome::Skipped {
                git_ref: event.git_ref.clone(),
                reason,
            });
        }

        let validation = self.validate(workflow)?;
        if !validation.is_valid() {
            return Err(TagrelError::InvalidWorkflow {
                reason: validation.errors.join("; "),
                help: Some("Run 'tagrel validate' for details".to_string()),
            });
        }

        let mut state = RunState::Idle;
        state.advance(RunState::Triggered)?;

        let run_id = new_run_id(&workflow.name, &event.git_ref);
        let (group, jobs) = Self::resolve(workflow, event, &run_id, &options.vars)?;

        if !options.quiet {
            self.print_execution_plan(workflow, event, &run_id, &group, &jobs);
        }

        if options.dry_run {
            return Ok(RunOutcome::Planned { run_id, group });
        }

        info!(run = %run_id, group = %group, "Entering concurrency group");
        let guard = match self
            .gate
            .acquire(&group, &run_id, workflow.concurrency.cancel_in_progress)
            .await
        {
            Ok(guard) => guard,
            Err(TagrelError::Cancelled { reason }) => {
                warn!(run = %run_id, "{}", reason);
                let reports = jobs
                    .iter()
                    .map(|job| JobReport::not_started(job.platform.label(), RunState::Cancelled, false))
                    .collect();
                let report = self
                    .finish(workflow, event, run_id, group, reports, true, started_at, start, options)
                    .await;
                return Ok(RunOutcome::Finished(report));
            }
            Err(e) => return Err(e),
        };
        state.advance(RunState::Gated)?;

        let token = guard.token().clone();
        let mut reports = Vec::with_capacity(jobs.len());
        let mut job_failed = false;
        let mut superseded = false;

        for job in &jobs {
            let label = job.platform.label();

            if !job.platform.matches_host() {
                warn!(platform = %label, "Matrix entry cannot build on this host, skipping");
                reports.push(JobReport::not_started(label, RunState::Gated, true));
                continue;
            }

            if token.is_cancelled() {
                superseded = true;
                reports.push(JobReport::not_started(label, RunState::Cancelled, false));
                continue;
            }

            if job_failed && workflow.strategy.fail_fast {
                reports.push(JobReport::not_started(label, RunState::Cancelled, false));
                continue;
            }

            let report = self.run_job(workflow, event, job, &run_id, &token, options).await;
            job_failed |= report.state == RunState::Failed;
            // Only the token stops a started job short of a terminal state
            superseded |= report.state == RunState::Cancelled;
            reports.push(report);
        }

        // A push that lands after every job finished does not undo the run
        drop(guard);

        let report = self
            .finish(workflow, event, run_id, group, reports, superseded, started_at, start, options)
            .await;
        Ok(RunOutcome::Finished(report))
    }

    /// Resolve the group key and every job's expressions up front, so a bad
    /// expression fails the run before it enters the gate
    fn resolve(
        workflow: &Workflow,
        event: &PushEvent,
        run_id: &str,
        vars: &HashMap<String, String>,
    ) -> Result<(String, Vec<JobPlan>), TagrelError> {
        let base = ExpressionContext::new(&workflow.name, event, run_id).with_vars(vars.clone());
        let group = base.expand(&workflow.concurrency.group)?;

        let jobs = workflow
            .strategy
            .matrix
            .iter()
            .map(|platform| {
                let scoped = base.for_platform(platform);
                let env = scoped.expand_env(&workflow.env)?;
                let scoped = scoped.with_env(env.clone());

                let mut steps = Vec::with_capacity(workflow.steps.len());
                for step in &workflow.steps {
                    let mut step_env = env.clone();
                    step_env.extend(scoped.expand_env(&step.env)?);
                    let step_scope = scoped.clone().with_env(step_env);

                    match &step.action {
                        Action::Shell { command, .. } => {
                            step_scope.expand(command)?;
                        }
                        Action::Publish { files } => {
                            for file in files {
                                step_scope.expand(file)?;
                            }
                        }
                        _ => {}
                    }

                    steps.push(step_scope);
                }

                Ok(JobPlan {
                    platform: platform.clone(),
                    expressions: scoped,
                    steps,
                })
            })
            .collect::<Result<Vec<_>, TagrelError>>()?;

        Ok((group, jobs))
    }

    /// Run the steps of one job in a fresh workspace
    async fn run_job(
        &self,
        workflow: &Workflow,
        event: &PushEvent,
        job: &JobPlan,
        run_id: &str,
        token: &CancelToken,
        options: &RunOptions,
    ) -> JobReport {
        let label = job.platform.label();
        let mut report = JobReport::not_started(label.clone(), RunState::Gated, false);
        let mut state = RunState::Gated;
        let console = !options.quiet;

        if console {
            println!();
            println!("{} {}", "Job".bold(), label.cyan());
        }

        let workspace = match Workspace::create(
            &options.workspace_root,
            run_id,
            &job.platform,
            options.keep_workspace,
        ) {
            Ok(ws) => ws,
            Err(e) => {
                report.state = RunState::Failed;
                report.error = Some(FailureInfo::from(&e));
                return report;
            }
        };

        let mut toolchain: Option<String> = None;
        let mut artifacts: Vec<PathBuf> = Vec::new();

        for (step, step_scope) in workflow.steps.iter().zip(&job.steps) {
            if token.is_cancelled() {
                if console {
                    println!("  {} {} {}", "⊘".yellow(), step.name.dimmed(), "(cancelled)".dimmed());
                }
                state = RunState::Cancelled;
                break;
            }

            let kind = step.kind();
            let Some(executor) = self.executors.get(&kind) else {
                let err = TagrelError::ExecutorNotFound {
                    kind: kind.to_string(),
                };
                self.fail_step(&mut report, &mut state, event, &err);
                break;
            };

            let ctx = StepContext {
                workspace: workspace.path(),
                event,
                platform: &job.platform,
                permissions: workflow.permissions,
                env: step_scope.env(),
                expressions: step_scope,
                toolchain: toolchain.as_deref(),
                artifacts: &artifacts,
            };

            debug!(step = %step.name, kind = %kind, "Starting step");
            let spinner = step_spinner(&step.name, options.verbose || !console);
            if console && spinner.is_none() {
                println!("  {} {}...", "→".blue(), step.name);
            }

            let outcome = tokio::select! {
                result = executor.execute(step, &ctx) => Some(result),
                _ = token.cancelled() => None,
            };

            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            match outcome {
                None => {
                    if console {
                        println!("  {} {} {}", "⊘".yellow(), step.name.bold(), "(cancelled)".dimmed());
                    }
                    report.steps.push(StepReport {
                        name: step.name.clone(),
                        kind: kind.to_string(),
                        success: false,
                        exit_code: None,
                        duration_ms: 0,
                    });
                    state = RunState::Cancelled;
                    break;
                }
                Some(Ok(result)) if result.success => {
                    if console {
                        println!(
                            "  {} {} ({:.2}s)",
                            "✓".green(),
                            step.name.bold(),
                            result.duration.as_secs_f64()
                        );
                        if options.verbose && !result.combined_output().trim().is_empty() {
                            println!("{}", result.combined_output().dimmed());
                        }
                    }

                    report.steps.push(step_report(step, &result));

                    if let Some(next) = RunState::after_step(kind) {
                        if let Err(e) = state.advance(next) {
                            self.fail_step(&mut report, &mut state, event, &e);
                            break;
                        }
                    }

                    if let Some(installed) = result.toolchain {
                        toolchain = Some(installed);
                    }
                    if kind == StepKind::Build {
                        report.artifact = result.outputs.first().cloned();
                        artifacts = result.outputs;
                    }
                    report.assets.extend(result.assets);
                }
                Some(Ok(result)) => {
                    report.steps.push(step_report(step, &result));
                    let err = step_error(step, event, &result);
                    self.fail_step(&mut report, &mut state, event, &err);
                    break;
                }
                Some(Err(err)) => {
                    report.steps.push(StepReport {
                        name: step.name.clone(),
                        kind: kind.to_string(),
                        success: false,
                        exit_code: None,
                        duration_ms: 0,
                    });
                    self.fail_step(&mut report, &mut state, event, &err);
                    break;
                }
            }
        }

        if options.keep_workspace {
            info!(workspace = %workspace.job_dir().display(), "Keeping job workspace");
        }

        report.state = state;
        report
    }

    /// Mark the job failed and show the failure as the tool reported it
    fn fail_step(
        &self,
        report: &mut JobReport,
        state: &mut RunState,
        event: &PushEvent,
        err: &TagrelError,
    ) {
        warn!(category = err.category(), "{}", err);

        eprintln!("  {} {}", "✗".red(), err.to_string().red());
        if let Some(output) = err.output() {
            if !output.trim().is_empty() {
                eprintln!("{}", output.trim_end());
            }
        }
        eprintln!();
        eprint!("{}", RecoverySuggestion::for_error(err, event.ref_name()));

        if let Err(e) = state.advance(RunState::Failed) {
            warn!(state = %state, error = %e, "Job state left unchanged");
        }
        report.error = Some(FailureInfo::from(err));
    }

    /// Aggregate, record and summarize a run
    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        workflow: &Workflow,
        event: &PushEvent,
        run_id: String,
        group: String,
        jobs: Vec<JobReport>,
        superseded: bool,
        started_at: SystemTime,
        start: Instant,
        options: &RunOptions,
    ) -> RunReport {
        let state = RunReport::aggregate(&jobs, superseded);
        let report = RunReport {
            run_id,
            workflow: workflow.name.clone(),
            git_ref: event.git_ref.clone(),
            repository: event.repository.clone(),
            group,
            state,
            jobs,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.record(&report).await {
                warn!(run = %report.run_id, error = %e, "Failed to record run");
            }
        }

        if !options.quiet {
            self.print_summary(&report);
        }
        report
    }

    fn print_execution_plan(
        &self,
        workflow: &Workflow,
        event: &PushEvent,
        run_id: &str,
        group: &str,
        jobs: &[JobPlan],
    ) {
        println!();
        println!("{}: {}", "Workflow".bold(), workflow.name);
        println!("{}", "═".repeat(50));
        println!("  {} {}", "Ref:".dimmed(), event.git_ref);
        println!("  {} {}", "Run:".dimmed(), run_id);
        println!("  {} {}", "Group:".dimmed(), group);
        println!();
        println!(
            "Execution plan ({} job{}, {} step{} each):",
            jobs.len(),
            if jobs.len() == 1 { "" } else { "s" },
            workflow.steps.len(),
            if workflow.steps.len() == 1 { "" } else { "s" }
        );

        for job in jobs {
            println!();
            print!("  {}", job.platform.label().bold());
            if !job.platform.matches_host() {
                print!(" {}", "[skipped on this host]".dimmed());
            }
            println!();

            for (i, name) in workflow.step_names().into_iter().enumerate() {
                let kind = workflow.step(name).map(|s| s.kind().to_string()).unwrap_or_default();
                println!("    {}. {} ({})", i + 1, name, kind);
            }

            if let Some(bin) = job.expressions.env().get("BIN_NAME") {
                let artifact = job.platform.artifact_path(Path::new(""), bin);
                println!("    {} {}", "artifact:".dimmed(), artifact.display());
            }
        }

        println!();
    }

    fn print_summary(&self, report: &RunReport) {
        let elapsed = format_duration_ms(report.duration_ms);

        println!();
        match report.state {
            RunState::Published => println!(
                "{} {}",
                state_mark(report.state),
                format!("Release {} published in {}", report.git_ref, elapsed).green()
            ),
            RunState::Cancelled => println!(
                "{} {}",
                state_mark(report.state),
                format!("Run {} cancelled after {}", report.run_id, elapsed).yellow()
            ),
            _ => println!(
                "{} {}",
                state_mark(report.state),
                format!("Run {} failed after {}", report.run_id, elapsed).red()
            ),
        }

        for asset in report.assets() {
            println!("  {} {} {}", "↑".green(), asset.name.bold(), asset.location.dimmed());
        }
    }

    /// Validate a workflow against the registered step executors
    ///
    /// Adds to [`WorkflowValidator`] the checks each executor makes of its
    /// own steps, and flags steps no executor is registered for.
    pub fn validate(&self, workflow: &Workflow) -> Result<ValidationResult, TagrelError> {
        let mut result = WorkflowValidator::validate(workflow)?;

        for step in &workflow.steps {
            let kind = step.kind();
            match self.executors.get(&kind) {
                Some(executor) => {
                    if let Err(e) = executor.validate_step(step) {
                        result.add_error(&e.to_string());
                    }
                }
                None => result.add_error(&format!(
                    "Step '{}': no executor registered for '{}' steps",
                    step.name, kind
                )),
            }
        }

        Ok(result)
    }

    /// Check if all required tools are available
    pub async fn check_tools(&self, workflow: &Workflow) -> Vec<String> {
        let mut missing = Vec::new();
        let mut kinds: Vec<StepKind> = workflow.steps.iter().map(Step::kind).collect();
        kinds.dedup();

        for kind in kinds {
            let available = match self.executors.get(&kind) {
                Some(executor) => executor.check_available().await.unwrap_or(false),
                None => false,
            };
            if !available && !missing.contains(&kind.to_string()) {
                missing.push(kind.to_string());
            }
        }

        missing
    }
}

impl Default for RunExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn step_report(step: &Step, result: &ExecutionResult) -> StepReport {
    StepReport {
        name: step.name.clone(),
        kind: step.kind().to_string(),
        success: result.success,
        exit_code: Some(result.exit_code),
        duration_ms: result.duration.as_millis() as u64,
    }
}

/// Typed error for a step whose tool exited non-zero
fn step_error(step: &Step, event: &PushEvent, result: &ExecutionResult) -> TagrelError {
    let output = result.combined_output();
    match &step.action {
        Action::Checkout { .. } => TagrelError::checkout_failed(event.ref_name(), output),
        Action::Toolchain { toolchain, .. } => TagrelError::ToolchainInstallFailed {
            toolchain: toolchain.clone(),
            stderr: output,
            help: None,
        },
        Action::Build { .. } => TagrelError::CompileFailed { stderr: output },
        Action::Publish { .. } | Action::Shell { .. } => TagrelError::StepFailed {
            step: step.name.clone(),
            exit_code: result.exit_code,
            stderr: output,
        },
    }
}
