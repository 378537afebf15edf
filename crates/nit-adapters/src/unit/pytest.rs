//! pytest adapter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use tracing::warn;

use crate::detect::{any_file_matching, manifest_contains, root_file_matching};
use crate::junit::parse_junit_xml;
use crate::process::run_tool;
use crate::traits::TestAdapter;
use crate::types::{AdapterError, RunResult, ValidationResult};

pub struct PytestAdapter;

impl PytestAdapter {
    /// Text fallback over the summary line: "3 passed, 1 failed in 0.2s".
    fn parse_text_output(output: &str) -> RunResult {
        let pick = |kind: &str| {
            Regex::new(&format!(r"(\d+) {kind}"))
                .ok()
                .and_then(|re| re.captures(output))
                .and_then(|c| c[1].parse::<u32>().ok())
                .unwrap_or(0)
        };
        let mut result =
            RunResult::from_counts(pick("passed"), pick("failed"), pick("skipped"), pick("error"));
        result.raw_output = output.to_string();
        result
    }
}

#[async_trait]
impl TestAdapter for PytestAdapter {
    fn name(&self) -> &'static str {
        "pytest"
    }

    fn language(&self) -> &'static str {
        "python"
    }

    fn detect(&self, root: &Path) -> bool {
        root_file_matching(root, "conftest.py")
            || root_file_matching(root, "pytest.ini")
            || manifest_contains(root, "pyproject.toml", "pytest")
            || manifest_contains(root, "requirements-dev.txt", "pytest")
            || manifest_contains(root, "requirements.txt", "pytest")
            || any_file_matching(root, "test_*.py", 4)
    }

    fn test_patterns(&self) -> Vec<&'static str> {
        vec!["**/test_*.py", "**/*_test.py"]
    }

    fn prompt_template(&self) -> &'static str {
        "unit_pytest"
    }

    async fn run_tests(
        &self,
        root: &Path,
        test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
        collect_coverage: bool,
    ) -> Result<RunResult, AdapterError> {
        let report = root.join(".nit").join("tmp").join("pytest-report.xml");
        if let Some(parent) = report.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let report_arg = format!("--junitxml={}", report.display());

        let mut args: Vec<String> = vec!["-m".into(), "pytest".into(), "-q".into(), report_arg];
        if collect_coverage {
            args.push("--cov".into());
        }
        if let Some(files) = test_files {
            args.extend(files.iter().map(|f| f.display().to_string()));
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = match run_tool("python3", &arg_refs, root, timeout_secs).await {
            Ok(output) => output,
            Err(AdapterError::ToolNotFound(_)) => {
                match run_tool("python", &arg_refs, root, timeout_secs).await {
                    Ok(output) => output,
                    Err(AdapterError::ToolNotFound(tool)) => {
                        return Ok(RunResult::tool_missing(format!(
                            "python interpreter not found ({tool}); is Python installed?"
                        )));
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };

        // Structured report preferred; text summary as fallback.
        if let Ok(xml) = std::fs::read_to_string(&report) {
            let _ = std::fs::remove_file(&report);
            match parse_junit_xml(&xml) {
                Ok(mut result) => {
                    result.raw_output = output.combined();
                    return Ok(result);
                }
                Err(e) => warn!("pytest JUnit report unreadable, falling back to text: {e}"),
            }
        }
        Ok(Self::parse_text_output(&output.combined()))
    }

    fn validate(&self, code: &str) -> ValidationResult {
        match nit_parsing::extract_from_source(code.as_bytes(), "python") {
            Ok(parsed) if parsed.has_errors => {
                ValidationResult::invalid(vec!["Python syntax error in generated test".into()])
            }
            Ok(parsed) => {
                let has_tests = parsed.functions.iter().any(|f| f.name.starts_with("test"))
                    || parsed.classes.iter().any(|c| c.name.starts_with("Test"));
                if has_tests {
                    ValidationResult::ok()
                } else {
                    ValidationResult::invalid(vec![
                        "No test functions found (expected def test_* or class Test*)".into(),
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
    fn detects_conftest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("conftest.py"), "").unwrap();
        assert!(PytestAdapter.detect(dir.path()));
    }

    #[test]
    fn does_not_detect_empty_project() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!PytestAdapter.detect(dir.path()));
    }

    #[test]
    fn validates_test_functions() {
        let valid = PytestAdapter.validate("def test_add():\n    assert 1 + 1 == 2\n");
        assert!(valid.valid);

        let no_tests = PytestAdapter.validate("def helper():\n    return 1\n");
        assert!(!no_tests.valid);

        let broken = PytestAdapter.validate("def test_(:\n");
        assert!(!broken.valid);
    }

    #[test]
    fn text_fallback_parses_summary() {
        let result =
            PytestAdapter::parse_text_output("4 passed, 1 failed, 2 skipped in 0.12s\n");
        assert_eq!(result.passed, 4);
        assert_eq!(result.failed, 1);
        assert_eq!(result.skipped, 2);
        assert!(!result.success);
    }
}
