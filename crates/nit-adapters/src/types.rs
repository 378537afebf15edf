//! Shared result types for test execution and coverage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Adapter not available: {0}")]
    Unavailable(String),

    #[error("Tool not found on PATH: {0}")]
    ToolNotFound(String),

    #[error("Subprocess timed out after {timeout_secs}s: {command}")]
    SubprocessTimeout { command: String, timeout_secs: u64 },

    #[error("Subprocess failed: {0}")]
    Subprocess(String),

    #[error("Failed to parse report: {0}")]
    ReportParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Status of an individual test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

/// One executed test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub status: CaseStatus,
    #[serde(default)]
    pub duration_ms: f64,
    #[serde(default)]
    pub failure_message: String,
    #[serde(default)]
    pub file_path: String,
}

/// Aggregate result of one test run.
///
/// Invariants: `total() = passed + failed + skipped + errors` and
/// `success ⇔ failed == 0 && errors == 0 && total > 0`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub errors: u32,
    #[serde(default)]
    pub test_cases: Vec<CaseResult>,
    #[serde(default)]
    pub raw_output: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageReport>,
}

impl RunResult {
    /// Build a result with the success flag derived from the counts.
    pub fn from_counts(passed: u32, failed: u32, skipped: u32, errors: u32) -> Self {
        let mut result = Self {
            passed,
            failed,
            skipped,
            errors,
            ..Default::default()
        };
        result.success = result.computed_success();
        result
    }

    /// Build from per-case results, deriving counts and success.
    pub fn from_cases(test_cases: Vec<CaseResult>, raw_output: String) -> Self {
        let mut result = Self {
            raw_output,
            ..Default::default()
        };
        for case in &test_cases {
            match case.status {
                CaseStatus::Passed => result.passed += 1,
                CaseStatus::Failed => result.failed += 1,
                CaseStatus::Skipped => result.skipped += 1,
                CaseStatus::Error => result.errors += 1,
            }
        }
        result.test_cases = test_cases;
        result.success = result.computed_success();
        result
    }

    /// A run whose tooling could not be located at all.
    pub fn tool_missing(message: impl Into<String>) -> Self {
        Self {
            raw_output: message.into(),
            success: false,
            ..Default::default()
        }
    }

    pub fn total(&self) -> u32 {
        self.passed + self.failed + self.skipped + self.errors
    }

    fn computed_success(&self) -> bool {
        self.failed == 0 && self.errors == 0 && self.total() > 0
    }
}

/// Result of syntax-validating generated test code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            ..Default::default()
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
            warnings: Vec::new(),
        }
    }
}

/// Per-line execution count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCoverage {
    pub line: u32,
    pub count: u64,
}

/// Per-function coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCoverage {
    pub name: String,
    pub line: u32,
    pub count: u64,
}

/// Per-branch coverage. The taken count is collapsed to 0/1: no current
/// consumer reads the true multiplicity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchCoverage {
    pub line: u32,
    pub taken_count: u64,
    pub total_count: u64,
}

/// Coverage for one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileCoverage {
    pub path: String,
    #[serde(default)]
    pub lines: Vec<LineCoverage>,
    #[serde(default)]
    pub functions: Vec<FunctionCoverage>,
    #[serde(default)]
    pub branches: Vec<BranchCoverage>,
}

impl FileCoverage {
    pub fn line_coverage(&self) -> f64 {
        if self.lines.is_empty() {
            return 0.0;
        }
        let covered = self.lines.iter().filter(|l| l.count > 0).count();
        covered as f64 / self.lines.len() as f64
    }
}

/// A complete coverage report. All ratios are within [0, 1].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageReport {
    pub files: BTreeMap<String, FileCoverage>,
    pub overall_line_coverage: f64,
    pub overall_function_coverage: f64,
    pub overall_branch_coverage: f64,
}

impl CoverageReport {
    /// Recompute the overall ratios from the per-file data.
    pub fn finalize(mut self) -> Self {
        let mut lines_total = 0usize;
        let mut lines_covered = 0usize;
        let mut funcs_total = 0usize;
        let mut funcs_covered = 0usize;
        let mut branches_total = 0usize;
        let mut branches_covered = 0usize;

        for file in self.files.values() {
            lines_total += file.lines.len();
            lines_covered += file.lines.iter().filter(|l| l.count > 0).count();
            funcs_total += file.functions.len();
            funcs_covered += file.functions.iter().filter(|f| f.count > 0).count();
            branches_total += file.branches.len();
            branches_covered += file.branches.iter().filter(|b| b.taken_count > 0).count();
        }

        let ratio = |covered: usize, total: usize| {
            if total == 0 {
                0.0
            } else {
                covered as f64 / total as f64
            }
        };
        self.overall_line_coverage = ratio(lines_covered, lines_total);
        self.overall_function_coverage = ratio(funcs_covered, funcs_total);
        self.overall_branch_coverage = ratio(branches_covered, branches_total);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_sum_of_counts() {
        let r = RunResult::from_counts(3, 1, 2, 1);
        assert_eq!(r.total(), 7);
    }

    #[test]
    fn success_requires_no_failures_and_some_tests() {
        assert!(RunResult::from_counts(3, 0, 1, 0).success);
        assert!(!RunResult::from_counts(3, 1, 0, 0).success);
        assert!(!RunResult::from_counts(3, 0, 0, 1).success);
        assert!(!RunResult::from_counts(0, 0, 0, 0).success);
    }

    #[test]
    fn from_cases_derives_counts() {
        let cases = vec![
            CaseResult {
                name: "a".into(),
                status: CaseStatus::Passed,
                duration_ms: 1.0,
                failure_message: String::new(),
                file_path: String::new(),
            },
            CaseResult {
                name: "b".into(),
                status: CaseStatus::Failed,
                duration_ms: 2.0,
                failure_message: "boom".into(),
                file_path: String::new(),
            },
        ];
        let r = RunResult::from_cases(cases, String::new());
        assert_eq!(r.passed, 1);
        assert_eq!(r.failed, 1);
        assert!(!r.success);
        assert_eq!(r.total(), 2);
    }

    #[test]
    fn coverage_ratios_bounded() {
        let mut report = CoverageReport::default();
        report.files.insert(
            "a.c".into(),
            FileCoverage {
                path: "a.c".into(),
                lines: vec![
                    LineCoverage { line: 10, count: 2 },
                    LineCoverage { line: 11, count: 0 },
                ],
                ..Default::default()
            },
        );
        let report = report.finalize();
        assert!((report.overall_line_coverage - 0.5).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&report.overall_line_coverage));
    }

    #[test]
    fn empty_report_is_zero() {
        let report = CoverageReport::default().finalize();
        assert_eq!(report.overall_line_coverage, 0.0);
        assert!(report.files.is_empty());
    }
}
