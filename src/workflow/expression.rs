// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! `${{ context.name }}` expressions
//!
//! Workflows reference the pushed ref, external variables, the job's matrix
//! entry and the workflow environment through placeholders. Every placeholder
//! must resolve; an undefined variable is an error rather than an empty string.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::errors::TagrelError;
use crate::workflow::{Os, Platform, PushEvent};

/// Environment prefix for external variables (`TAGREL_VAR_BIN_NAME`)
pub const VAR_ENV_PREFIX: &str = "TAGREL_VAR_";

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_-]*)\s*\}\}")
            .expect("placeholder regex is valid")
    })
}

/// Values visible to expressions during a run
#[derive(Debug, Clone, Default)]
pub struct ExpressionContext {
    github: HashMap<String, String>,
    vars: HashMap<String, String>,
    env: HashMap<String, String>,
    matrix: HashMap<String, String>,
    runner: HashMap<String, String>,
}

impl ExpressionContext {
    /// Context for a run of `workflow_name` triggered by `event`
    pub fn new(workflow_name: &str, event: &PushEvent, run_id: &str) -> Self {
        let github = HashMap::from([
            ("workflow".to_string(), workflow_name.to_string()),
            ("ref".to_string(), event.git_ref.clone()),
            ("ref_name".to_string(), event.ref_name().to_string()),
            ("repository".to_string(), event.repository.clone()),
            ("run_id".to_string(), run_id.to_string()),
            ("event_name".to_string(), "push".to_string()),
        ]);

        let runner_os = match Os::host() {
            Some(Os::Windows) => "Windows",
            Some(Os::Linux) => "Linux",
            Some(Os::Macos) => "macOS",
            None => std::env::consts::OS,
        };
        let runner = HashMap::from([("os".to_string(), runner_os.to_string())]);

        Self {
            github,
            runner,
            ..Default::default()
        }
    }

    /// Attach external variables
    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    /// Attach the resolved workflow environment
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Copy of this context scoped to one matrix entry
    pub fn for_platform(&self, platform: &Platform) -> Self {
        let mut scoped = self.clone();
        scoped.matrix = HashMap::from([
            ("os".to_string(), platform.os.to_string()),
            ("target".to_string(), platform.target.clone().unwrap_or_default()),
        ]);
        scoped
    }

    /// The resolved environment
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Look up `context.name`
    pub fn lookup(&self, context: &str, name: &str) -> Result<String, TagrelError> {
        let scope = match context {
            "github" => &self.github,
            "vars" => &self.vars,
            "env" => &self.env,
            "matrix" => &self.matrix,
            "runner" => &self.runner,
            other => {
                return Err(TagrelError::UnresolvedExpression {
                    expression: format!("{}.{}", other, name),
                    reason: format!("unknown context '{}'", other),
                })
            }
        };

        scope
            .get(name)
            .cloned()
            .ok_or_else(|| TagrelError::UnresolvedExpression {
                expression: format!("{}.{}", context, name),
                reason: "not defined".to_string(),
            })
    }

    /// Replace every placeholder in `template`
    pub fn expand(&self, template: &str) -> Result<String, TagrelError> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;

        for caps in placeholder().captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&template[last..whole.start()]);
            out.push_str(&self.lookup(&caps[1], &caps[2])?);
            last = whole.end();
        }
        out.push_str(&template[last..]);

        if out.contains("${{") {
            return Err(TagrelError::UnresolvedExpression {
                expression: template.to_string(),
                reason: "malformed placeholder".to_string(),
            });
        }

        Ok(out)
    }

    /// Expand every value of an environment map
    pub fn expand_env(
        &self,
        env: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, TagrelError> {
        env.iter()
            .map(|(k, v)| Ok((k.clone(), self.expand(v)?)))
            .collect()
    }
}

/// External variables: `TAGREL_VAR_*` from the process environment,
/// overridden by explicit `NAME=VALUE` pairs
pub fn collect_vars(overrides: &[(String, String)]) -> HashMap<String, String> {
    let mut vars: HashMap<String, String> = std::env::vars()
        .filter_map(|(k, v)| k.strip_prefix(VAR_ENV_PREFIX).map(|name| (name.to_string(), v)))
        .collect();

    vars.extend(overrides.iter().cloned());
    vars
}

/// Parse a `NAME=VALUE` command-line pair
pub fn parse_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ExpressionContext {
        let event = PushEvent::new("v1.2.3", "octo/app");
        ExpressionContext::new("release", &event, "abc123")
            .with_vars(HashMap::from([("BIN_NAME".to_string(), "app".to_string())]))
    }

    #[test]
    fn test_default_concurrency_group() {
        let group = context()
            .expand(crate::workflow::DEFAULT_CONCURRENCY_GROUP)
            .unwrap();
        assert_eq!(group, "release-refs/tags/v1.2.3");
    }

    #[test]
    fn test_whitespace_tolerant() {
        let out = context().expand("${{vars.BIN_NAME}}-${{  github.ref_name  }}").unwrap();
        assert_eq!(out, "app-v1.2.3");
    }

    #[test]
    fn test_env_resolves_through_vars() {
        let ctx = context();
        let env = ctx
            .expand_env(&HashMap::from([(
                "BIN_NAME".to_string(),
                "${{ vars.BIN_NAME }}".to_string(),
            )]))
            .unwrap();
        let ctx = ctx.with_env(env);
        assert_eq!(ctx.expand("target/release/${{ env.BIN_NAME }}.exe").unwrap(), "target/release/app.exe");
    }

    #[test]
    fn test_undefined_variable_is_an_error() {
        let err = context().expand("${{ vars.MISSING }}").unwrap_err();
        assert!(matches!(err, TagrelError::UnresolvedExpression { .. }));
    }

    #[test]
    fn test_unknown_context_is_an_error() {
        assert!(context().expand("${{ secrets.TOKEN }}").is_err());
        assert!(context().expand("${{ github }}").is_err());
    }

    #[test]
    fn test_matrix_scope() {
        let platform = Platform {
            os: Os::Windows,
            target: None,
        };
        let scoped = context().for_platform(&platform);
        assert_eq!(scoped.expand("${{ matrix.os }}").unwrap(), "windows");
        assert_eq!(scoped.expand("[${{ matrix.target }}]").unwrap(), "[]");
        assert!(context().expand("${{ matrix.os }}").is_err());
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(parse_var("BIN_NAME=app").unwrap(), ("BIN_NAME".into(), "app".into()));
        assert_eq!(parse_var("EMPTY=").unwrap(), ("EMPTY".into(), String::new()));
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_overrides_win_over_environment() {
        let vars = collect_vars(&[("TAGREL_TEST_ONLY".to_string(), "cli".to_string())]);
        assert_eq!(vars.get("TAGREL_TEST_ONLY").map(String::as_str), Some("cli"));
    }
}
