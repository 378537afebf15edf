//! The adapter capability surfaces.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::types::{AdapterError, CoverageReport, RunResult, ValidationResult};

/// Wraps one test framework behind a uniform interface.
///
/// Adapters are compile-time known and stateless; detection and
/// validation are synchronous, execution is async because it shells out.
#[async_trait]
pub trait TestAdapter: Send + Sync {
    /// Registry key (e.g. "vitest", "pytest").
    fn name(&self) -> &'static str;

    /// Primary language this framework tests.
    fn language(&self) -> &'static str;

    /// Whether the project at `root` uses this framework.
    fn detect(&self, root: &Path) -> bool;

    /// Globs matching this framework's test files.
    fn test_patterns(&self) -> Vec<&'static str>;

    /// Name of the prompt template builders should render.
    fn prompt_template(&self) -> &'static str;

    /// Execute tests. `test_files = None` runs the whole suite.
    async fn run_tests(
        &self,
        root: &Path,
        test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
        collect_coverage: bool,
    ) -> Result<RunResult, AdapterError>;

    /// Syntax-check generated test code without executing it.
    fn validate(&self, code: &str) -> ValidationResult;
}

/// Wraps one coverage tool behind a uniform interface.
#[async_trait]
pub trait CoverageAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn language(&self) -> &'static str;

    fn detect(&self, root: &Path) -> bool;

    /// Run the suite under coverage and return the parsed report.
    async fn run_coverage(
        &self,
        root: &Path,
        test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
    ) -> Result<CoverageReport, AdapterError>;

    /// Parse an existing coverage artifact. A missing file yields an
    /// empty report rather than an error.
    fn parse_coverage_file(&self, path: &Path) -> Result<CoverageReport, AdapterError>;
}
