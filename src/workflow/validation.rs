// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Workflow validation
//!
//! Validates workflow configuration before any run starts.

use std::collections::HashSet;

use crate::errors::TagrelError;
use crate::workflow::{
    Access, Action, ReleaseHostKind, StepKind, TriggerFilter, Workflow,
};

/// Workflow validator
pub struct WorkflowValidator;

impl WorkflowValidator {
    /// Validate a workflow configuration
    pub fn validate(workflow: &Workflow) -> Result<ValidationResult, TagrelError> {
        let mut result = ValidationResult::new();

        if workflow.name.trim().is_empty() {
            result.add_error("Workflow name is empty");
        }

        Self::validate_trigger(workflow, &mut result);
        Self::validate_steps(workflow, &mut result);
        Self::validate_strategy(workflow, &mut result);

        if workflow.release.host == ReleaseHostKind::Local && workflow.release.directory.is_none()
        {
            result.add_error("Release host 'local' requires 'release.directory'");
        }

        if workflow.permissions.contents < Access::Write {
            result.add_warning(&format!(
                "permissions.contents is '{}': the publish step needs 'write' and will fail",
                workflow.permissions.contents
            ));
        }

        if !workflow.concurrency.cancel_in_progress {
            result.add_warning(
                "concurrency.cancel_in_progress is false: runs of the same ref queue instead of superseding",
            );
        }

        Ok(result)
    }

    fn validate_trigger(workflow: &Workflow, result: &mut ValidationResult) {
        if workflow.on.push.tags.is_empty() {
            result.add_error("on.push.tags is empty: no tag push can trigger the workflow");
            return;
        }

        if let Err(e) = TriggerFilter::for_workflow(workflow) {
            result.add_error(&format!("Invalid tag pattern: {}", e));
        }
    }

    fn validate_steps(workflow: &Workflow, result: &mut ValidationResult) {
        if workflow.steps.is_empty() {
            result.add_error("Workflow has no steps defined");
            return;
        }

        let mut seen_names = HashSet::new();
        for step in &workflow.steps {
            if !seen_names.insert(&step.name) {
                result.add_error(&format!("Duplicate step name: '{}'", step.name));
            }

            if let Action::Shell { command, .. } = &step.action {
                if command.trim().is_empty() {
                    result.add_error(&format!("Step '{}': Shell command is empty", step.name));
                }
            }

            if let Action::Toolchain { toolchain, .. } = &step.action {
                if toolchain.trim().is_empty() {
                    result.add_error(&format!("Step '{}': toolchain is empty", step.name));
                }
            }
        }

        // Core steps: each exactly once, in canonical order
        let core: Vec<(usize, StepKind)> = workflow
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s.kind()))
            .filter(|(_, k)| *k != StepKind::Shell)
            .collect();

        for kind in StepKind::CORE {
            match core.iter().filter(|(_, k)| *k == kind).count() {
                0 => result.add_error(&format!("Missing required '{}' step", kind)),
                1 => {}
                n => result.add_error(&format!("'{}' step appears {} times", kind, n)),
            }
        }

        let order: Vec<StepKind> = core.iter().map(|(_, k)| *k).collect();
        let mut sorted = order.clone();
        sorted.sort_by_key(|k| StepKind::CORE.iter().position(|c| c == k));
        if order != sorted {
            result.add_error(&format!(
                "Steps must run in the order checkout → toolchain → build → publish (found: {})",
                order.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(" → ")
            ));
        }

        // Published is terminal: nothing may run after the upload
        if let Some(publish) = workflow.steps.iter().position(|s| s.kind() == StepKind::Publish) {
            if let Some(after) = workflow.steps.get(publish + 1) {
                result.add_error(&format!(
                    "Publish must be the last step (found '{}' after '{}')",
                    after.name, workflow.steps[publish].name
                ));
            }
        }

        if let Some(first) = workflow.steps.first() {
            if first.kind() == StepKind::Shell {
                result.add_error(&format!(
                    "Step '{}': shell steps need a checked-out workspace and cannot run before checkout",
                    first.name
                ));
            }
        }

        let publishes_artifact = workflow
            .steps
            .iter()
            .any(|s| matches!(&s.action, Action::Publish { files } if files.is_empty()));
        if publishes_artifact && !workflow.env.contains_key("BIN_NAME") {
            result.add_warning(
                "BIN_NAME is not declared in 'env': the build artifact name cannot be derived",
            );
        }
    }

    fn validate_strategy(workflow: &Workflow, result: &mut ValidationResult) {
        if workflow.strategy.matrix.is_empty() {
            result.add_error("strategy.matrix is empty: no job would run");
            return;
        }

        for platform in &workflow.strategy.matrix {
            if !platform.matches_host() {
                result.add_warning(&format!(
                    "Matrix entry '{}' cannot build on this host and will be skipped; set 'target' to cross-compile",
                    platform.label()
                ));
            }
        }
    }
}

/// Result of workflow validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Step;

    #[test]
    fn test_default_release_is_valid() {
        let workflow = Workflow::default_release(Some("app"));
        let result = WorkflowValidator::validate(&workflow).unwrap();
        assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn test_validate_empty_workflow() {
        let mut workflow = Workflow::default_release(Some("app"));
        workflow.steps.clear();

        let result = WorkflowValidator::validate(&workflow).unwrap();
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("no steps"));
    }

    #[test]
    fn test_validate_duplicate_names() {
        let mut workflow = Workflow::default_release(Some("app"));
        workflow.steps[1].name = "Checkout".into();

        let result = WorkflowValidator::validate(&workflow).unwrap();
        assert!(result.errors.iter().any(|e| e.contains("Duplicate")));
    }

    #[test]
    fn test_publish_before_build_is_rejected() {
        let mut workflow = Workflow::default_release(Some("app"));
        workflow.steps.swap(2, 3);

        let result = WorkflowValidator::validate(&workflow).unwrap();
        assert!(result.errors.iter().any(|e| e.contains("order")));
    }

    #[test]
    fn test_missing_core_step() {
        let mut workflow = Workflow::default_release(Some("app"));
        workflow.steps.remove(1);

        let result = WorkflowValidator::validate(&workflow).unwrap();
        assert!(result.errors.iter().any(|e| e.contains("'toolchain'")));
    }

    #[test]
    fn test_shell_step_after_build_is_allowed() {
        let mut workflow = Workflow::default_release(Some("app"));
        workflow.steps.insert(
            3,
            Step::new(
                "Smoke test",
                Action::Shell {
                    command: "target/release/app --version".into(),
                    shell: "bash".into(),
                },
            ),
        );

        let result = WorkflowValidator::validate(&workflow).unwrap();
        assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn test_step_after_publish_is_rejected() {
        let mut workflow = Workflow::default_release(Some("app"));
        workflow.steps.push(Step::new(
            "Announce",
            Action::Shell {
                command: "exit 1".into(),
                shell: "sh".into(),
            },
        ));

        let result = WorkflowValidator::validate(&workflow).unwrap();
        assert!(!result.is_valid());
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("Publish must be the last step") && e.contains("'Announce'")));
    }

    #[test]
    fn test_read_permission_warns() {
        let mut workflow = Workflow::default_release(Some("app"));
        workflow.permissions.contents = Access::Read;

        let result = WorkflowValidator::validate(&workflow).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("publish")));
    }

    #[test]
    fn test_local_host_needs_directory() {
        let mut workflow = Workflow::default_release(Some("app"));
        workflow.release.host = ReleaseHostKind::Local;

        let result = WorkflowValidator::validate(&workflow).unwrap();
        assert!(result.errors.iter().any(|e| e.contains("release.directory")));
    }

    #[test]
    fn test_invalid_tag_glob() {
        let mut workflow = Workflow::default_release(Some("app"));
        workflow.on.push.tags = vec!["v[".into()];

        let result = WorkflowValidator::validate(&workflow).unwrap();
        assert!(result.errors.iter().any(|e| e.contains("Invalid tag pattern")));
    }
}
