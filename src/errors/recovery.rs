// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Error recovery suggestions
//!
//! Release runs never retry on their own, so every failure ends with a
//! concrete next step for the person who pushed the tag.

use super::TagrelError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Suggest installing a missing tool
    pub fn install_tool(tool: &str) -> Self {
        match tool {
            "rustup" | "cargo" => Self {
                action: "Install the Rust toolchain manager".into(),
                steps: vec!["rustup installs and updates the compiler used by the build step".into()],
                commands: vec![
                    "# Unix:".into(),
                    "curl --proto '=https' --tlsv1.2 -sSf https://sh.rustup.rs | sh".into(),
                    "".into(),
                    "# Windows:".into(),
                    "winget install Rustlang.Rustup".into(),
                ],
            },
            "gh" => Self {
                action: "Install and authenticate the GitHub CLI".into(),
                steps: vec!["The github release host uploads assets through 'gh'".into()],
                commands: vec!["gh auth login".into()],
            },
            _ => Self {
                action: format!("Install {}", tool),
                steps: vec![format!("Install {} and ensure it's in your PATH", tool)],
                commands: vec![],
            },
        }
    }

    /// Suggest re-triggering the release after fixing the cause
    pub fn retrigger(tag: &str) -> Self {
        Self {
            action: format!("Re-trigger the release for '{}'", tag),
            steps: vec![
                "Failed runs are never retried automatically".into(),
                "Fix the cause, then move the tag to the fixed commit and push it again".into(),
            ],
            commands: vec![
                format!("git tag -f {}", tag),
                format!("git push -f origin {}", tag),
            ],
        }
    }

    /// Pick a suggestion for a run failure
    pub fn for_error(error: &TagrelError, tag: &str) -> Self {
        match error {
            TagrelError::ToolNotFound { tool, .. } => Self::install_tool(tool),
            TagrelError::PermissionDenied { .. } => Self {
                action: "Grant write access to repository contents".into(),
                steps: vec!["Add the permission to the workflow and push the tag again".into()],
                commands: vec!["permissions:".into(), "  contents: write".into()],
            },
            TagrelError::PublishFailed { .. } => Self {
                action: "Check release host access".into(),
                steps: vec![
                    "Publishing failed after the build succeeded".into(),
                    format!("Re-run 'tagrel run --ref {}' once the host is reachable", tag),
                ],
                commands: vec!["gh auth status".into()],
            },
            _ => Self::retrigger(tag),
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_failure_suggests_retrigger() {
        let err = TagrelError::CompileFailed { stderr: String::new() };
        let suggestion = RecoverySuggestion::for_error(&err, "v1.2.0");
        assert!(suggestion.commands.iter().any(|c| c.contains("git push -f origin v1.2.0")));
    }

    #[test]
    fn test_display_lists_commands() {
        let rendered = RecoverySuggestion::install_tool("gh").to_string();
        assert!(rendered.starts_with("→ Install and authenticate"));
        assert!(rendered.contains("gh auth login"));
    }
}
