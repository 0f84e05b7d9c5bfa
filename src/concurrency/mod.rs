// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Run concurrency
//!
//! Concurrency groups keyed by workflow and ref, and the cancellation tokens
//! that let a newer run stop an older one between (and during) steps.

mod gate;
mod token;

pub use gate::{ConcurrencyGate, GateGuard};
pub use token::CancelToken;
