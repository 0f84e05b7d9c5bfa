// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Run state machine
//!
//! `Idle → Triggered → Gated → CheckedOut → ToolchainReady → Built → Published`,
//! with `Failed` and `Cancelled` reachable from any non-terminal state. There
//! are no recovery transitions.

use serde::{Deserialize, Serialize};

use crate::errors::TagrelError;
use crate::workflow::StepKind;

/// State of a run or of one matrix job
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Triggered,
    Gated,
    CheckedOut,
    ToolchainReady,
    Built,
    Published,
    Failed,
    /// Superseded by a newer run of the same concurrency group
    Cancelled,
}

impl RunState {
    /// Next state on the success path
    pub fn successor(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Triggered),
            Self::Triggered => Some(Self::Gated),
            Self::Gated => Some(Self::CheckedOut),
            Self::CheckedOut => Some(Self::ToolchainReady),
            Self::ToolchainReady => Some(Self::Built),
            Self::Built => Some(Self::Published),
            Self::Published | Self::Failed | Self::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published | Self::Failed | Self::Cancelled)
    }

    /// Move to `next`, rejecting anything but the linear successor or a
    /// failure/cancellation of a live run
    pub fn advance(&mut self, next: RunState) -> Result<(), TagrelError> {
        let allowed = match next {
            Self::Failed | Self::Cancelled => !self.is_terminal(),
            _ => self.successor() == Some(next),
        };

        if !allowed {
            return Err(TagrelError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }

        *self = next;
        Ok(())
    }

    /// State reached when a step of `kind` succeeds; shell steps leave the
    /// state unchanged
    pub fn after_step(kind: StepKind) -> Option<Self> {
        match kind {
            StepKind::Checkout => Some(Self::CheckedOut),
            StepKind::Toolchain => Some(Self::ToolchainReady),
            StepKind::Build => Some(Self::Built),
            StepKind::Publish => Some(Self::Published),
            StepKind::Shell => None,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Triggered => "triggered",
            Self::Gated => "gated",
            Self::CheckedOut => "checked_out",
            Self::ToolchainReady => "toolchain_ready",
            Self::Built => "built",
            Self::Published => "published",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_path() {
        let mut state = RunState::Idle;
        for next in [
            RunState::Triggered,
            RunState::Gated,
            RunState::CheckedOut,
            RunState::ToolchainReady,
            RunState::Built,
            RunState::Published,
        ] {
            state.advance(next).unwrap();
        }
        assert!(state.is_terminal());
    }

    #[test]
    fn test_cannot_skip_steps() {
        let mut state = RunState::Gated;
        assert!(state.advance(RunState::Built).is_err());
        assert_eq!(state, RunState::Gated);
    }

    #[test]
    fn test_no_recovery_from_terminal_states() {
        let mut failed = RunState::Failed;
        assert!(failed.advance(RunState::Published).is_err());
        assert!(failed.advance(RunState::Cancelled).is_err());

        let mut published = RunState::Published;
        assert!(published.advance(RunState::Failed).is_err());
    }

    #[test]
    fn test_failure_from_any_live_state() {
        for start in [RunState::Triggered, RunState::CheckedOut, RunState::Built] {
            let mut state = start;
            state.advance(RunState::Failed).unwrap();
            assert_eq!(state, RunState::Failed);
        }
    }

    #[test]
    fn test_step_kinds_map_to_states() {
        assert_eq!(RunState::after_step(StepKind::Build), Some(RunState::Built));
        assert_eq!(RunState::after_step(StepKind::Shell), None);
    }
}
