// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Trigger evaluation
//!
//! Decides whether a push event starts a workflow run.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

use crate::errors::TagrelError;
use crate::workflow::Workflow;

const TAG_PREFIX: &str = "refs/tags/";

/// A push of a ref to a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Fully qualified ref, e.g. `refs/tags/v1.0.0`
    pub git_ref: String,
    /// Repository path or URL
    pub repository: String,
}

impl PushEvent {
    /// Create a push event
    ///
    /// A bare name without a `refs/` prefix is taken to be a tag.
    pub fn new(git_ref: &str, repository: &str) -> Self {
        let git_ref = if git_ref.starts_with("refs/") {
            git_ref.to_string()
        } else {
            format!("{}{}", TAG_PREFIX, git_ref)
        };

        Self {
            git_ref,
            repository: repository.to_string(),
        }
    }

    /// Short tag name, or `None` when the ref is not a tag
    pub fn tag_name(&self) -> Option<&str> {
        self.git_ref.strip_prefix(TAG_PREFIX)
    }

    /// Short name of the ref (`refs/heads/main` becomes `main`)
    pub fn ref_name(&self) -> &str {
        self.tag_name()
            .or_else(|| self.git_ref.strip_prefix("refs/heads/"))
            .unwrap_or(&self.git_ref)
    }
}

/// Compiled tag filter of a workflow
#[derive(Debug, Clone)]
pub struct TriggerFilter {
    patterns: Vec<Pattern>,
}

impl TriggerFilter {
    /// Compile tag globs
    pub fn new(globs: &[String]) -> Result<Self, TagrelError> {
        let patterns = globs
            .iter()
            .map(|g| Pattern::new(g))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Compile the push filter of a workflow
    pub fn for_workflow(workflow: &Workflow) -> Result<Self, TagrelError> {
        Self::new(&workflow.on.push.tags)
    }

    /// Whether the event starts a run
    pub fn matches(&self, event: &PushEvent) -> bool {
        match event.tag_name() {
            Some(tag) => self.matches_tag(tag),
            None => false,
        }
    }

    /// Whether a short tag name matches any pattern
    pub fn matches_tag(&self, tag: &str) -> bool {
        // `*` stops at `/`, a `**` component crosses it
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        self.patterns.iter().any(|p| p.matches_with(tag, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(globs: &[&str]) -> TriggerFilter {
        let globs: Vec<String> = globs.iter().map(|g| g.to_string()).collect();
        TriggerFilter::new(&globs).unwrap()
    }

    #[test]
    fn test_bare_name_is_a_tag() {
        let event = PushEvent::new("v1.0.0", ".");
        assert_eq!(event.git_ref, "refs/tags/v1.0.0");
        assert_eq!(event.tag_name(), Some("v1.0.0"));
    }

    #[test]
    fn test_version_tags_match() {
        let f = filter(&["v*"]);
        assert!(f.matches(&PushEvent::new("refs/tags/v1.0.0", ".")));
        assert!(f.matches(&PushEvent::new("v2", ".")));
    }

    #[test]
    fn test_non_matching_refs_do_not_trigger() {
        let f = filter(&["v*"]);
        for git_ref in [
            "refs/tags/release-1.0",
            "refs/tags/1.0.0",
            "refs/heads/v1.0.0",
            "refs/heads/main",
            "refs/tags/v1/rc",
        ] {
            assert!(!f.matches(&PushEvent::new(git_ref, ".")), "{} matched", git_ref);
        }
    }

    #[test]
    fn test_double_star_crosses_separator() {
        let f = filter(&["v*/**"]);
        assert!(f.matches(&PushEvent::new("refs/tags/v1/rc", ".")));
    }

    #[test]
    fn test_any_pattern_matches() {
        let f = filter(&["v*", "release-*"]);
        assert!(f.matches_tag("release-2024"));
        assert!(!f.matches_tag("nightly"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(TriggerFilter::new(&["v[".to_string()]).is_err());
    }

    #[test]
    fn test_ref_name_of_branch() {
        let event = PushEvent::new("refs/heads/main", ".");
        assert_eq!(event.tag_name(), None);
        assert_eq!(event.ref_name(), "main");
    }
}
