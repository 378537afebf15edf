//! Cypress adapter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;

use crate::detect::{package_json_has_dep, root_file_matching};
use crate::process::run_tool;
use crate::traits::TestAdapter;
use crate::types::{AdapterError, RunResult, ValidationResult};

pub struct CypressAdapter;

impl CypressAdapter {
    /// Parse the run summary table: "✔  All specs passed!  …" or the
    /// "Passing: N / Failing: M / Pending: K" block.
    pub(super) fn parse_summary(output: &str) -> RunResult {
        let pick = |kind: &str| {
            Regex::new(&format!(r"{kind}:\s+(\d+)"))
                .ok()
                .and_then(|re| re.captures(output))
                .and_then(|c| c[1].parse::<u32>().ok())
                .unwrap_or(0)
        };
        let mut result = RunResult::from_counts(
            pick("Passing"),
            pick("Failing"),
            pick("Pending") + pick("Skipped"),
            0,
        );
        result.raw_output = output.to_string();
        result
    }
}

#[async_trait]
impl TestAdapter for CypressAdapter {
    fn name(&self) -> &'static str {
        "cypress"
    }

    fn language(&self) -> &'static str {
        "javascript"
    }

    fn detect(&self, root: &Path) -> bool {
        root_file_matching(root, "cypress.config.*")
            || root_file_matching(root, "cypress.json")
            || package_json_has_dep(root, "cypress")
            || root.join("cypress").is_dir()
    }

    fn test_patterns(&self) -> Vec<&'static str> {
        vec!["cypress/e2e/**/*.cy.*", "cypress/integration/**/*.spec.*"]
    }

    fn prompt_template(&self) -> &'static str {
        "e2e_cypress"
    }

    async fn run_tests(
        &self,
        root: &Path,
        test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
        _collect_coverage: bool,
    ) -> Result<RunResult, AdapterError> {
        let mut args: Vec<String> = vec!["cypress".into(), "run".into()];
        if let Some(files) = test_files {
            let specs: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
            args.push("--spec".into());
            args.push(specs.join(","));
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = match run_tool("npx", &arg_refs, root, timeout_secs).await {
            Ok(output) => output,
            Err(AdapterError::ToolNotFound(tool)) => {
                return Ok(RunResult::tool_missing(format!(
                    "{tool} not found; is Node.js installed?"
                )));
            }
            Err(e) => return Err(e),
        };
        Ok(Self::parse_summary(&output.combined()))
    }

    fn validate(&self, code: &str) -> ValidationResult {
        let language = if code.contains(": ") { "typescript" } else { "javascript" };
        match nit_parsing::extract_from_source(code.as_bytes(), language) {
            Ok(parsed) if parsed.has_errors => {
                ValidationResult::invalid(vec![format!("{language} syntax error in generated test")])
            }
            Ok(_) => {
                if code.contains("cy.") {
                    ValidationResult::ok()
                } else {
                    ValidationResult::invalid(vec![
                        "Generated test does not use the cy.* API".into(),
                    ])
                }
            }
            Err(e) => ValidationResult::invalid(vec![e.to_string()]),
        }
    }
}
