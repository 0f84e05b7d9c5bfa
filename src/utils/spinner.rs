// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Progress spinner utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("  {spinner:.blue} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Spinner for a running step, only when a person is watching the terminal
pub fn step_spinner(message: &str, verbose: bool) -> Option<ProgressBar> {
    if verbose || !console::user_attended() {
        return None;
    }
    Some(create_spinner(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_spinner_when_verbose() {
        assert!(step_spinner("Build", true).is_none());
    }
}
