//! C/C++ adapters: Catch2 and GoogleTest, both executed through ctest.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;

use crate::detect::manifest_contains;
use crate::junit::parse_junit_xml;
use crate::process::run_tool;
use crate::traits::TestAdapter;
use crate::types::{AdapterError, RunResult, ValidationResult};

fn cmake_matches(root: &Path, needles: &[&str]) -> bool {
    needles
        .iter()
        .any(|n| manifest_contains(root, "CMakeLists.txt", n))
}

fn find_build_dir(root: &Path) -> Option<PathBuf> {
    ["build", "cmake-build-debug", "cmake-build-release", "out"]
        .iter()
        .map(|d| root.join(d))
        .find(|d| d.join("CTestTestfile.cmake").is_file())
}

/// Run ctest in the project's build directory and parse its JUnit output;
/// fall back to the "N% tests passed, M tests failed out of T" summary.
async fn run_ctest(root: &Path, timeout_secs: u64) -> Result<RunResult, AdapterError> {
    let Some(build_dir) = find_build_dir(root) else {
        return Ok(RunResult::tool_missing(
            "no configured CMake build directory found (expected build/CTestTestfile.cmake)",
        ));
    };

    let report_name = "nit-ctest-report.xml";
    let report = build_dir.join(report_name);
    let report_arg = format!("--output-junit={report_name}");
    let output = match run_tool(
        "ctest",
        &["--output-on-failure", &report_arg],
        &build_dir,
        timeout_secs,
    )
    .await
    {
        Ok(output) => output,
        Err(AdapterError::ToolNotFound(tool)) => {
            return Ok(RunResult::tool_missing(format!(
                "{tool} not found; is CMake installed?"
            )));
        }
        Err(e) => return Err(e),
    };

    if let Ok(xml) = std::fs::read_to_string(&report) {
        let _ = std::fs::remove_file(&report);
        if let Ok(mut result) = parse_junit_xml(&xml) {
            result.raw_output = output.combined();
            return Ok(result);
        }
    }

    let text = output.combined();
    let re = Regex::new(r"(\d+)% tests passed, (\d+) tests failed out of (\d+)").unwrap();
    if let Some(caps) = re.captures(&text) {
        let failed: u32 = caps[2].parse().unwrap_or(0);
        let total: u32 = caps[3].parse().unwrap_or(0);
        let mut result = RunResult::from_counts(total.saturating_sub(failed), failed, 0, 0);
        result.raw_output = text;
        return Ok(result);
    }
    Ok(RunResult {
        raw_output: text,
        success: false,
        ..Default::default()
    })
}

fn validate_cpp(code: &str, markers: &[&str], framework: &str) -> ValidationResult {
    match nit_parsing::extract_from_source(code.as_bytes(), "cpp") {
        Ok(parsed) if parsed.has_errors => {
            ValidationResult::invalid(vec!["C++ syntax error in generated test".into()])
        }
        Ok(_) => {
            if markers.iter().any(|m| code.contains(m)) {
                ValidationResult::ok()
            } else {
                ValidationResult::invalid(vec![format!("No {framework} test cases found")])
            }
        }
        Err(e) => ValidationResult::invalid(vec![e.to_string()]),
    }
}

// ── Catch2 ──────────────────────────────────────────────────────────

pub struct Catch2Adapter;

#[async_trait]
impl TestAdapter for Catch2Adapter {
    fn name(&self) -> &'static str {
        "catch2"
    }

    fn language(&self) -> &'static str {
        "cpp"
    }

    fn detect(&self, root: &Path) -> bool {
        cmake_matches(root, &["Catch2", "catch_discover_tests"])
            || manifest_contains(root, "conanfile.txt", "catch2")
            || manifest_contains(root, "vcpkg.json", "catch2")
    }

    fn test_patterns(&self) -> Vec<&'static str> {
        vec!["**/*_test.cpp", "**/test_*.cpp", "**/*.catch2.cpp"]
    }

    fn prompt_template(&self) -> &'static str {
        "unit_catch2"
    }

    async fn run_tests(
        &self,
        root: &Path,
        _test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
        _collect_coverage: bool,
    ) -> Result<RunResult, AdapterError> {
        run_ctest(root, timeout_secs).await
    }

    fn validate(&self, code: &str) -> ValidationResult {
        validate_cpp(code, &["TEST_CASE", "SCENARIO", "CATCH_TEST_CASE"], "Catch2")
    }
}

// ── GoogleTest ──────────────────────────────────────────────────────

pub struct GtestAdapter;

#[async_trait]
impl TestAdapter for GtestAdapter {
    fn name(&self) -> &'static str {
        "gtest"
    }

    fn language(&self) -> &'static str {
        "cpp"
    }

    fn detect(&self, root: &Path) -> bool {
        cmake_matches(root, &["GTest", "gtest_discover_tests", "gtest"])
            || manifest_contains(root, "conanfile.txt", "gtest")
            || manifest_contains(root, "vcpkg.json", "gtest")
    }

    fn test_patterns(&self) -> Vec<&'static str> {
        vec!["**/*_test.cpp", "**/*_test.cc"]
    }

    fn prompt_template(&self) -> &'static str {
        "unit_gtest"
    }

    async fn run_tests(
        &self,
        root: &Path,
        _test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
        _collect_coverage: bool,
    ) -> Result<RunResult, AdapterError> {
        run_ctest(root, timeout_secs).await
    }

    fn validate(&self, code: &str) -> ValidationResult {
        validate_cpp(code, &["TEST(", "TEST_F(", "TEST_P("], "GoogleTest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_catch2_in_cmake() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("CMakeLists.txt"),
            "find_package(Catch2 REQUIRED)\ncatch_discover_tests(tests)\n",
        )
        .unwrap();
        assert!(Catch2Adapter.detect(dir.path()));
        assert!(!GtestAdapter.detect(dir.path()));
    }

    #[test]
    fn detects_gtest_in_cmake() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("CMakeLists.txt"),
            "find_package(GTest REQUIRED)\ntarget_link_libraries(t PRIVATE GTest::gtest_main)\n",
        )
        .unwrap();
        assert!(GtestAdapter.detect(dir.path()));
    }

    #[test]
    fn validates_catch2_markers() {
        let code = "#include <catch2/catch_test_macros.hpp>\n\nTEST_CASE(\"adds\") {\n    REQUIRE(1 + 1 == 2);\n}\n";
        assert!(Catch2Adapter.validate(code).valid);
        assert!(!Catch2Adapter.validate("int main() { return 0; }").valid);
    }

    #[test]
    fn validates_gtest_markers() {
        let code = "#include <gtest/gtest.h>\n\nTEST(Calc, Adds) {\n    EXPECT_EQ(1 + 1, 2);\n}\n";
        assert!(GtestAdapter.validate(code).valid);
    }

    #[tokio::test]
    async fn missing_build_dir_reports_tool_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = Catch2Adapter
            .run_tests(dir.path(), None, 10, false)
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.total(), 0);
        assert!(result.raw_output.contains("build directory"));
    }
}
