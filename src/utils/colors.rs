// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Terminal color utilities
//!
//! Provides consistent color schemes across the CLI.

use colored::{ColoredString, Colorize};

use crate::workflow::RunState;

/// Print a styled header
pub fn print_header(title: &str) {
    println!("{}", title.bold());
    println!("{}", "═".repeat(title.chars().count().max(40)));
}

/// Print a styled section
pub fn print_section(title: &str) {
    println!();
    println!("{}:", title.bold());
}

/// Run state colored by outcome
pub fn state_label(state: RunState) -> ColoredString {
    let text = state.to_string();
    match state {
        RunState::Published => text.green(),
        RunState::Failed => text.red(),
        RunState::Cancelled => text.yellow(),
        _ => text.normal(),
    }
}

/// Status mark for a run state
pub fn state_mark(state: RunState) -> ColoredString {
    match state {
        RunState::Published => "✓".green(),
        RunState::Failed => "✗".red(),
        RunState::Cancelled => "⊘".yellow(),
        _ => "○".dimmed(),
    }
}

/// Human-readable duration from milliseconds
pub fn format_duration_ms(ms: u64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1_000.0)
    } else {
        format!("{}m{:02}s", ms / 60_000, (ms % 60_000) / 1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration_ms(250), "250ms");
        assert_eq!(format_duration_ms(12_300), "12.3s");
        assert_eq!(format_duration_ms(125_000), "2m05s");
    }
}
