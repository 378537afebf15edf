//! Go coverprofile adapter.
//!
//! Profile lines look like `file.go:12.34,15.2 3 1` — a statement block
//! with its line span, statement count, and execution count.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::process::run_tool;
use crate::traits::CoverageAdapter;
use crate::types::{AdapterError, CoverageReport, FileCoverage, LineCoverage};

pub struct GoCoverAdapter;

fn parse_coverprofile(text: &str) -> CoverageReport {
    let mut report = CoverageReport::default();

    for line in text.lines().skip_while(|l| l.starts_with("mode:")) {
        let line = line.trim();
        if line.is_empty() || line.starts_with("mode:") {
            continue;
        }
        // <file>:<startLine>.<startCol>,<endLine>.<endCol> <stmts> <count>
        let Some((file_part, rest)) = line.rsplit_once(' ').and_then(|(head, count)| {
            head.rsplit_once(' ').map(|(f, _stmts)| (f, count))
        }) else {
            continue;
        };
        let Some((file_path, span)) = file_part.split_once(':') else {
            continue;
        };
        let count: u64 = rest.parse().unwrap_or(0);
        let Some((start, end)) = span.split_once(',') else {
            continue;
        };
        let start_line: u32 = start.split('.').next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let end_line: u32 = end.split('.').next().and_then(|s| s.parse().ok()).unwrap_or(0);
        if start_line == 0 || end_line < start_line {
            continue;
        }

        let file = report
            .files
            .entry(file_path.to_string())
            .or_insert_with(|| FileCoverage {
                path: file_path.to_string(),
                ..Default::default()
            });
        for line_no in start_line..=end_line {
            match file.lines.iter().position(|l| l.line == line_no) {
                Some(index) => {
                    let existing = &mut file.lines[index];
                    existing.count = existing.count.max(count);
                }
                None => file.lines.push(LineCoverage { line: line_no, count }),
            }
        }
    }

    for file in report.files.values_mut() {
        file.lines.sort_by_key(|l| l.line);
    }
    report.finalize()
}

#[async_trait]
impl CoverageAdapter for GoCoverAdapter {
    fn name(&self) -> &'static str {
        "go-cover"
    }

    fn language(&self) -> &'static str {
        "go"
    }

    fn detect(&self, root: &Path) -> bool {
        root.join("go.mod").is_file()
    }

    async fn run_coverage(
        &self,
        root: &Path,
        _test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
    ) -> Result<CoverageReport, AdapterError> {
        let out = root.join(".nit").join("tmp").join("go-cover.out");
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let profile_arg = format!("-coverprofile={}", out.display());
        match run_tool("go", &["test", &profile_arg, "./..."], root, timeout_secs).await {
            Ok(_) => {}
            Err(AdapterError::ToolNotFound(_)) => return Ok(CoverageReport::default()),
            Err(e) => return Err(e),
        }
        self.parse_coverage_file(&out)
    }

    fn parse_coverage_file(&self, path: &Path) -> Result<CoverageReport, AdapterError> {
        if !path.is_file() {
            return Ok(CoverageReport::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(parse_coverprofile(&text))
    }
}
