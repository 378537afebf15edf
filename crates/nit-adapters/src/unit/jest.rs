//! Jest adapter. Shares the JSON reporter shape with vitest.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use super::vitest::{parse_json_report, parse_text_summary, validate_js_test};
use crate::detect::{manifest_contains, package_json_has_dep, root_file_matching};
use crate::process::run_tool;
use crate::traits::TestAdapter;
use crate::types::{AdapterError, RunResult, ValidationResult};

pub struct JestAdapter;

#[async_trait]
impl TestAdapter for JestAdapter {
    fn name(&self) -> &'static str {
        "jest"
    }

    fn language(&self) -> &'static str {
        "javascript"
    }

    fn detect(&self, root: &Path) -> bool {
        root_file_matching(root, "jest.config.*")
            || package_json_has_dep(root, "jest")
            || package_json_has_dep(root, "ts-jest")
            || manifest_contains(root, "package.json", "\"jest\"")
    }

    fn test_patterns(&self) -> Vec<&'static str> {
        vec!["**/*.test.js", "**/*.test.jsx", "**/*.spec.js", "**/*.test.ts"]
    }

    fn prompt_template(&self) -> &'static str {
        "unit_jest"
    }

    async fn run_tests(
        &self,
        root: &Path,
        test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
        collect_coverage: bool,
    ) -> Result<RunResult, AdapterError> {
        let mut args: Vec<String> = vec!["jest".into(), "--json".into()];
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

        if let Some(start) = output.stdout.find('{') {
            match parse_json_report(&output.stdout[start..]) {
                Ok(mut result) => {
                    result.raw_output = output.combined();
                    return Ok(result);
                }
                Err(e) => warn!("jest JSON report unreadable, falling back to text: {e}"),
            }
        }
        Ok(parse_text_summary(&output.combined()))
    }

    fn validate(&self, code: &str) -> ValidationResult {
        validate_js_test(code, "jest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_jest_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("jest.config.js"), "module.exports = {};").unwrap();
        assert!(JestAdapter.detect(dir.path()));
    }

    #[test]
    fn detects_top_level_jest_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"jest":{}}"#).unwrap();
        assert!(JestAdapter.detect(dir.path()));
    }
}
