//! LCOV tracefile parsing and the adapters built on it.
//!
//! LCOV is the lingua franca: vitest/jest emit it through their coverage
//! providers, `cargo llvm-cov --lcov` emits it for Rust, and the lcov
//! tool converts gcov data for C/C++.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::detect::{any_file_matching, package_json_has_dep};
use crate::process::run_tool;
use crate::traits::CoverageAdapter;
use crate::types::{
    AdapterError, BranchCoverage, CoverageReport, FileCoverage, FunctionCoverage, LineCoverage,
};

/// Parse an LCOV tracefile.
///
/// Records handled: `SF:` (file), `DA:<line>,<count>` (line execution),
/// `FN:<line>,<name>` / `FNDA:<count>,<name>` (functions),
/// `BRDA:<line>,<block>,<branch>,<taken>` (branches, `-` = never taken),
/// `end_of_record`. Branch taken counts are collapsed to 0/1.
pub fn parse_lcov(text: &str) -> CoverageReport {
    let mut report = CoverageReport::default();
    let mut current: Option<FileCoverage> = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(path) = line.strip_prefix("SF:") {
            if let Some(done) = current.take() {
                report.files.insert(done.path.clone(), done);
            }
            current = Some(FileCoverage {
                path: path.to_string(),
                ..Default::default()
            });
        } else if let Some(rest) = line.strip_prefix("DA:") {
            let Some(file) = current.as_mut() else { continue };
            let mut parts = rest.splitn(2, ',');
            let (Some(line_no), Some(count)) = (parts.next(), parts.next()) else {
                continue;
            };
            if let (Ok(line), Ok(count)) = (line_no.parse(), count.parse()) {
                file.lines.push(LineCoverage { line, count });
            }
        } else if let Some(rest) = line.strip_prefix("FN:") {
            let Some(file) = current.as_mut() else { continue };
            let mut parts = rest.splitn(2, ',');
            if let (Some(line_no), Some(name)) = (parts.next(), parts.next()) {
                if let Ok(line) = line_no.parse() {
                    file.functions.push(FunctionCoverage {
                        name: name.to_string(),
                        line,
                        count: 0,
                    });
                }
            }
        } else if let Some(rest) = line.strip_prefix("FNDA:") {
            let Some(file) = current.as_mut() else { continue };
            let mut parts = rest.splitn(2, ',');
            if let (Some(count), Some(name)) = (parts.next(), parts.next()) {
                if let Ok(count) = count.parse::<u64>() {
                    if let Some(f) = file.functions.iter_mut().find(|f| f.name == name) {
                        f.count = count;
                    }
                }
            }
        } else if let Some(rest) = line.strip_prefix("BRDA:") {
            let Some(file) = current.as_mut() else { continue };
            let parts: Vec<&str> = rest.split(',').collect();
            if parts.len() == 4 {
                if let Ok(line) = parts[0].parse() {
                    let taken = if parts[3] == "-" {
                        0
                    } else {
                        parts[3].parse::<u64>().unwrap_or(0)
                    };
                    file.branches.push(BranchCoverage {
                        line,
                        taken_count: taken.min(1),
                        total_count: 1,
                    });
                }
            }
        } else if line == "end_of_record" {
            if let Some(done) = current.take() {
                report.files.insert(done.path.clone(), done);
            }
        }
    }
    if let Some(done) = current.take() {
        report.files.insert(done.path.clone(), done);
    }

    report.finalize()
}

fn parse_lcov_file(path: &Path) -> Result<CoverageReport, AdapterError> {
    if !path.is_file() {
        return Ok(CoverageReport::default());
    }
    let text = std::fs::read_to_string(path)?;
    Ok(parse_lcov(&text))
}

// ── JS/TS lcov adapter ──────────────────────────────────────────────

pub struct LcovAdapter;

#[async_trait]
impl CoverageAdapter for LcovAdapter {
    fn name(&self) -> &'static str {
        "lcov"
    }

    fn language(&self) -> &'static str {
        "javascript"
    }

    fn detect(&self, root: &Path) -> bool {
        package_json_has_dep(root, "vitest")
            || package_json_has_dep(root, "jest")
            || root.join("coverage").join("lcov.info").is_file()
    }

    async fn run_coverage(
        &self,
        root: &Path,
        test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
    ) -> Result<CoverageReport, AdapterError> {
        let runner = if package_json_has_dep(root, "vitest") {
            vec!["vitest".to_string(), "run".to_string(), "--coverage".to_string()]
        } else {
            vec!["jest".to_string(), "--coverage".to_string()]
        };
        let mut args = runner;
        if let Some(files) = test_files {
            args.extend(files.iter().map(|f| f.display().to_string()));
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        match run_tool("npx", &arg_refs, root, timeout_secs).await {
            Ok(_) | Err(AdapterError::ToolNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.parse_coverage_file(&root.join("coverage").join("lcov.info"))
    }

    fn parse_coverage_file(&self, path: &Path) -> Result<CoverageReport, AdapterError> {
        parse_lcov_file(path)
    }
}

// ── gcov (via lcov tracefiles) ──────────────────────────────────────

pub struct GcovAdapter;

#[async_trait]
impl CoverageAdapter for GcovAdapter {
    fn name(&self) -> &'static str {
        "gcov"
    }

    fn language(&self) -> &'static str {
        "cpp"
    }

    fn detect(&self, root: &Path) -> bool {
        any_file_matching(root, "*.gcno", 4) || any_file_matching(root, "*.gcda", 4)
    }

    async fn run_coverage(
        &self,
        root: &Path,
        _test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
    ) -> Result<CoverageReport, AdapterError> {
        let out = root.join(".nit").join("tmp").join("gcov.info");
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let out_arg = out.display().to_string();
        match run_tool(
            "lcov",
            &["--capture", "--directory", ".", "--output-file", &out_arg],
            root,
            timeout_secs,
        )
        .await
        {
            Ok(_) => {}
            Err(AdapterError::ToolNotFound(_)) => return Ok(CoverageReport::default()),
            Err(e) => return Err(e),
        }
        self.parse_coverage_file(&out)
    }

    fn parse_coverage_file(&self, path: &Path) -> Result<CoverageReport, AdapterError> {
        parse_lcov_file(path)
    }
}

// ── cargo llvm-cov ──────────────────────────────────────────────────

pub struct LlvmCovAdapter;

#[async_trait]
impl CoverageAdapter for LlvmCovAdapter {
    fn name(&self) -> &'static str {
        "cargo-llvm-cov"
    }

    fn language(&self) -> &'static str {
        "rust"
    }

    fn detect(&self, root: &Path) -> bool {
        root.join("Cargo.toml").is_file()
    }

    async fn run_coverage(
        &self,
        root: &Path,
        _test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
    ) -> Result<CoverageReport, AdapterError> {
        let out = root.join(".nit").join("tmp").join("rust-cov.info");
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let out_arg = out.display().to_string();
        match run_tool(
            "cargo",
            &["llvm-cov", "--lcov", "--output-path", &out_arg],
            root,
            timeout_secs,
        )
        .await
        {
            Ok(_) => {}
            Err(AdapterError::ToolNotFound(_)) => return Ok(CoverageReport::default()),
            Err(e) => return Err(e),
        }
        self.parse_coverage_file(&out)
    }

    fn parse_coverage_file(&self, path: &Path) -> Result<CoverageReport, AdapterError> {
        parse_lcov_file(path)
    }
}
