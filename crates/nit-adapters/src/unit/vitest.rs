//! Vitest adapter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::detect::{package_json_has_dep, root_file_matching};
use crate::process::run_tool;
use crate::traits::TestAdapter;
use crate::types::{AdapterError, CaseResult, CaseStatus, RunResult, ValidationResult};

pub struct VitestAdapter;

/// Shape of the vitest/jest JSON reporter output (the subset we read).
#[derive(Deserialize)]
struct JsonReport {
    #[serde(default)]
    #[serde(rename = "testResults")]
    test_results: Vec<JsonFileResult>,
}

#[derive(Deserialize)]
struct JsonFileResult {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "assertionResults")]
    assertion_results: Vec<JsonAssertion>,
}

#[derive(Deserialize)]
struct JsonAssertion {
    #[serde(default, rename = "fullName")]
    full_name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default, rename = "failureMessages")]
    failure_messages: Vec<String>,
}

/// Parse the vitest/jest `--reporter=json` document.
pub(super) fn parse_json_report(text: &str) -> Result<RunResult, AdapterError> {
    let report: JsonReport = serde_json::from_str(text)
        .map_err(|e| AdapterError::ReportParse(format!("JSON reporter: {e}")))?;

    let mut cases = Vec::new();
    for file in report.test_results {
        for assertion in file.assertion_results {
            let status = match assertion.status.as_str() {
                "passed" => CaseStatus::Passed,
                "failed" => CaseStatus::Failed,
                "skipped" | "pending" | "todo" | "disabled" => CaseStatus::Skipped,
                _ => CaseStatus::Error,
            };
            let name = if assertion.full_name.is_empty() {
                assertion.title
            } else {
                assertion.full_name
            };
            cases.push(CaseResult {
                name,
                status,
                duration_ms: assertion.duration.unwrap_or(0.0),
                failure_message: assertion.failure_messages.join("\n"),
                file_path: file.name.clone(),
            });
        }
    }
    Ok(RunResult::from_cases(cases, String::new()))
}

/// Text fallback over summary lines like "Tests  3 passed | 1 failed (4)".
pub(super) fn parse_text_summary(output: &str) -> RunResult {
    let pick = |kind: &str| {
        regex::Regex::new(&format!(r"(\d+)\s+{kind}"))
            .ok()
            .and_then(|re| re.captures(output))
            .and_then(|c| c[1].parse::<u32>().ok())
            .unwrap_or(0)
    };
    let mut result =
        RunResult::from_counts(pick("passed"), pick("failed"), pick("skipped"), 0);
    result.raw_output = output.to_string();
    result
}

/// Shared validation for JS/TS test files: must parse and reference the
/// framework.
pub(super) fn validate_js_test(code: &str, framework: &str) -> ValidationResult {
    let language = if code.contains(": ") || code.contains("import type") {
        "typescript"
    } else {
        "javascript"
    };
    match nit_parsing::extract_from_source(code.as_bytes(), language) {
        Ok(parsed) if parsed.has_errors => {
            ValidationResult::invalid(vec![format!("{language} syntax error in generated test")])
        }
        Ok(_) => {
            let references_framework =
                code.contains(framework) || code.contains("test(") || code.contains("describe(");
            if references_framework {
                ValidationResult::ok()
            } else {
                ValidationResult::invalid(vec![format!(
                    "Generated code does not look like a {framework} test"
                )])
            }
        }
        Err(e) => ValidationResult::invalid(vec![e.to_string()]),
    }
}

#[async_trait]
impl TestAdapter for VitestAdapter {
    fn name(&self) -> &'static str {
        "vitest"
    }

    fn language(&self) -> &'static str {
        "javascript"
    }

    fn detect(&self, root: &Path) -> bool {
        root_file_matching(root, "vitest.config.*")
            || root_file_matching(root, "vitest.workspace.*")
            || package_json_has_dep(root, "vitest")
    }

    fn test_patterns(&self) -> Vec<&'static str> {
        vec!["**/*.test.ts", "**/*.test.tsx", "**/*.spec.ts", "**/*.test.js", "**/*.spec.js"]
    }

    fn prompt_template(&self) -> &'static str {
        "unit_vitest"
    }

    async fn run_tests(
        &self,
        root: &Path,
        test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
        collect_coverage: bool,
    ) -> Result<RunResult, AdapterError> {
        let mut args: Vec<String> =
            vec!["vitest".into(), "run".into(), "--reporter=json".into()];
        if collect_coverage {
            args.push("--coverage".into());
        }
        if let Some(files) = test_files {
            args.extend(files.iter().map(|f| f.display().to_string()));
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

        // The JSON document is the last JSON object on stdout.
        if let Some(start) = output.stdout.find('{') {
            match parse_json_report(&output.stdout[start..]) {
                Ok(mut result) => {
                    result.raw_output = output.combined();
                    return Ok(result);
                }
                Err(e) => warn!("vitest JSON report unreadable, falling back to text: {e}"),
            }
        }
        Ok(parse_text_summary(&output.combined()))
    }

    fn validate(&self, code: &str) -> ValidationResult {
        validate_js_test(code, "vitest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dev_dependency() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"devDependencies":{"vitest":"^1.0.0"}}"#,
        )
        .unwrap();
        assert!(VitestAdapter.detect(dir.path()));
    }

    #[test]
    fn detects_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vitest.config.ts"), "").unwrap();
        assert!(VitestAdapter.detect(dir.path()));
    }

    #[test]
    fn json_report_parsed() {
        let json = r#"{
            "testResults": [{
                "name": "/src/math.test.ts",
                "assertionResults": [
                    {"fullName": "math > adds", "status": "passed", "duration": 2.0, "failureMessages": []},
                    {"fullName": "math > divides", "status": "failed", "duration": 1.0,
                     "failureMessages": ["expected 2 to be 3"]}
                ]
            }]
        }"#;
        let result = parse_json_report(json).unwrap();
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
        assert!(!result.success);
        assert!(result.test_cases[1].failure_message.contains("expected 2 to be 3"));
    }

    #[test]
    fn validates_vitest_import() {
        let code = "import { test, expect } from 'vitest';\n\ntest('adds', () => {\n  expect(1 + 1).toBe(2);\n});\n";
        assert!(VitestAdapter.validate(code).valid);
        assert!(!VitestAdapter.validate("const x = ;").valid);
    }
}
