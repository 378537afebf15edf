//! Playwright adapter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::detect::{package_json_has_dep, root_file_matching};
use crate::process::run_tool;
use crate::traits::TestAdapter;
use crate::types::{AdapterError, CaseResult, CaseStatus, RunResult, ValidationResult};

pub struct PlaywrightAdapter;

// Playwright's JSON reporter nests suites arbitrarily deep; specs carry
// the test results.
#[derive(Deserialize)]
struct PwReport {
    #[serde(default)]
    suites: Vec<PwSuite>,
}

#[derive(Deserialize)]
struct PwSuite {
    #[serde(default)]
    file: String,
    #[serde(default)]
    suites: Vec<PwSuite>,
    #[serde(default)]
    specs: Vec<PwSpec>,
}

#[derive(Deserialize)]
struct PwSpec {
    #[serde(default)]
    title: String,
    #[serde(default)]
    tests: Vec<PwTest>,
}

#[derive(Deserialize)]
struct PwTest {
    #[serde(default)]
    results: Vec<PwAttempt>,
}

#[derive(Deserialize)]
struct PwAttempt {
    #[serde(default)]
    status: String,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    error: Option<PwError>,
}

#[derive(Deserialize)]
struct PwError {
    #[serde(default)]
    message: String,
}

fn collect_suite(suite: &PwSuite, file: &str, cases: &mut Vec<CaseResult>) {
    let file = if suite.file.is_empty() { file } else { &suite.file };
    for spec in &suite.specs {
        for test in &spec.tests {
            // The last attempt decides the outcome (retries allowed).
            let Some(attempt) = test.results.last() else {
                continue;
            };
            let status = match attempt.status.as_str() {
                "passed" => CaseStatus::Passed,
                "failed" | "timedOut" | "interrupted" => CaseStatus::Failed,
                "skipped" => CaseStatus::Skipped,
                _ => CaseStatus::Error,
            };
            cases.push(CaseResult {
                name: spec.title.clone(),
                status,
                duration_ms: attempt.duration,
                failure_message: attempt
                    .error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_default(),
                file_path: file.to_string(),
            });
        }
    }
    for child in &suite.suites {
        collect_suite(child, file, cases);
    }
}

pub(super) fn parse_playwright_report(text: &str) -> Result<RunResult, AdapterError> {
    let report: PwReport = serde_json::from_str(text)
        .map_err(|e| AdapterError::ReportParse(format!("playwright JSON: {e}")))?;
    let mut cases = Vec::new();
    for suite in &report.suites {
        collect_suite(suite, "", &mut cases);
    }
    Ok(RunResult::from_cases(cases, String::new()))
}

#[async_trait]
impl TestAdapter for PlaywrightAdapter {
    fn name(&self) -> &'static str {
        "playwright"
    }

    fn language(&self) -> &'static str {
        "javascript"
    }

    fn detect(&self, root: &Path) -> bool {
        root_file_matching(root, "playwright.config.*")
            || package_json_has_dep(root, "@playwright/test")
    }

    fn test_patterns(&self) -> Vec<&'static str> {
        vec!["**/*.spec.ts", "**/e2e/**/*.ts"]
    }

    fn prompt_template(&self) -> &'static str {
        "e2e_playwright"
    }

    async fn run_tests(
        &self,
        root: &Path,
        test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
        _collect_coverage: bool,
    ) -> Result<RunResult, AdapterError> {
        let mut args: Vec<String> =
            vec!["playwright".into(), "test".into(), "--reporter=json".into()];
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

        if let Some(start) = output.stdout.find('{') {
            match parse_playwright_report(&output.stdout[start..]) {
                Ok(mut result) => {
                    result.raw_output = output.combined();
                    return Ok(result);
                }
                Err(e) => warn!("playwright JSON report unreadable: {e}"),
            }
        }
        Ok(RunResult {
            raw_output: output.combined(),
            success: output.exit_code == 0,
            ..Default::default()
        })
    }

    fn validate(&self, code: &str) -> ValidationResult {
        match nit_parsing::extract_from_source(code.as_bytes(), "typescript") {
            Ok(parsed) if parsed.has_errors => {
                ValidationResult::invalid(vec!["TypeScript syntax error in generated test".into()])
            }
            Ok(_) => {
                if code.contains("@playwright/test") {
                    ValidationResult::ok()
                } else {
                    ValidationResult::invalid(vec![
                        "Generated test does not import @playwright/test".into(),
                    ])
                }
            }
            Err(e) => ValidationResult::invalid(vec![e.to_string()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_playwright_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("playwright.config.ts"), "").unwrap();
        assert!(PlaywrightAdapter.detect(dir.path()));
    }

    #[test]
    fn parses_nested_suites() {
        let json = r#"{
            "suites": [{
                "file": "login.spec.ts",
                "suites": [{
                    "file": "",
                    "specs": [{
                        "title": "logs in",
                        "tests": [{"results": [{"status": "failed", "duration": 1200.0,
                            "error": {"message": "locator('#login-button') not found"}}]}]
                    }],
                    "suites": []
                }],
                "specs": [{
                    "title": "shows form",
                    "tests": [{"results": [{"status": "passed", "duration": 300.0}]}]
                }]
            }]
        }"#;
        let result = parse_playwright_report(json).unwrap();
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
        let failed = result
            .test_cases
            .iter()
            .find(|c| c.status == CaseStatus::Failed)
            .unwrap();
        assert!(failed.failure_message.contains("not found"));
        assert_eq!(failed.file_path, "login.spec.ts");
    }

    #[test]
    fn validation_requires_playwright_import() {
        let code = "import { test, expect } from '@playwright/test';\n\ntest('loads', async ({ page }) => {\n  await page.goto('/');\n});\n";
        assert!(PlaywrightAdapter.validate(code).valid);
        assert!(!PlaywrightAdapter.validate("test('x', () => {});").valid);
    }
}
