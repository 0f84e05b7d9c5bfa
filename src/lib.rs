// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! # tagrel - Tag-triggered release builder
//!
//! `tagrel` turns a pushed version tag into a published release binary.
//!
//! ## Features
//!
//! - **Tag triggers** - Only refs matching the workflow's tag patterns start a run
//! - **Concurrency groups** - At most one run per group; a newer push supersedes an older one
//! - **Isolated workspaces** - Every job checks out the exact tag into a fresh directory
//! - **Release hosts** - Upload to a GitHub release or to a local release directory
//! - **Run history** - Every run is recorded with its step results and assets
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a release workflow
//! tagrel init --bin-name app
//!
//! # Build and publish the release for a tag
//! tagrel run --ref v1.2.0
//!
//! # Inspect what happened
//! tagrel runs list
//! ```

pub mod cli;
pub mod concurrency;
pub mod errors;
pub mod executors;
pub mod history;
pub mod release;
pub mod utils;
pub mod workflow;

// Re-export commonly used types
pub use errors::{TagrelError, TagrelResult};
pub use workflow::{PushEvent, RunExecutor, RunOutcome, Workflow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
