// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Release workflows
//!
//! This module defines the workflow file format, trigger matching,
//! expressions, the run state machine and the run executor.

mod definition;
mod executor;
mod expression;
mod report;
mod state;
mod trigger;
mod validation;
pub mod workspace;

pub use definition::*;
pub use executor::{RunExecutor, RunOptions};
pub use expression::{collect_vars, parse_var, ExpressionContext, VAR_ENV_PREFIX};
pub use report::{FailureInfo, JobReport, PublishedAsset, RunOutcome, RunReport, StepReport};
pub use state::RunState;
pub use trigger::{PushEvent, TriggerFilter};
pub use validation::{ValidationResult, WorkflowValidator};
pub use workspace::Workspace;
