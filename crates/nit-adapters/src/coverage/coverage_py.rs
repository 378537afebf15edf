//! coverage.py adapter, reading the `coverage json` report format.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::detect::manifest_contains;
use crate::process::run_tool;
use crate::traits::CoverageAdapter;
use crate::types::{AdapterError, CoverageReport, FileCoverage, LineCoverage};

pub struct CoveragePyAdapter;

#[derive(Deserialize)]
struct CoverageJson {
    #[serde(default)]
    files: std::collections::BTreeMap<String, CoverageJsonFile>,
}

#[derive(Deserialize)]
struct CoverageJsonFile {
    #[serde(default)]
    executed_lines: Vec<u32>,
    #[serde(default)]
    missing_lines: Vec<u32>,
}

#[async_trait]
impl CoverageAdapter for CoveragePyAdapter {
    fn name(&self) -> &'static str {
        "coverage-py"
    }

    fn language(&self) -> &'static str {
        "python"
    }

    fn detect(&self, root: &Path) -> bool {
        manifest_contains(root, "pyproject.toml", "coverage")
            || manifest_contains(root, "pyproject.toml", "pytest-cov")
            || root.join(".coverage").is_file()
            || root.join("coverage.json").is_file()
    }

    async fn run_coverage(
        &self,
        root: &Path,
        test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
    ) -> Result<CoverageReport, AdapterError> {
        let mut args: Vec<String> = vec![
            "-m".into(),
            "pytest".into(),
            "-q".into(),
            "--cov".into(),
            "--cov-report=json".into(),
        ];
        if let Some(files) = test_files {
            args.extend(files.iter().map(|f| f.display().to_string()));
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        match run_tool("python3", &arg_refs, root, timeout_secs).await {
            Ok(_) => {}
            Err(AdapterError::ToolNotFound(_)) => return Ok(CoverageReport::default()),
            Err(e) => return Err(e),
        }
        self.parse_coverage_file(&root.join("coverage.json"))
    }

    fn parse_coverage_file(&self, path: &Path) -> Result<CoverageReport, AdapterError> {
        if !path.is_file() {
            return Ok(CoverageReport::default());
        }
        let text = std::fs::read_to_string(path)?;
        let parsed: CoverageJson = serde_json::from_str(&text)
            .map_err(|e| AdapterError::ReportParse(format!("coverage.json: {e}")))?;

        let mut report = CoverageReport::default();
        for (file_path, file) in parsed.files {
            let executed: HashSet<u32> = file.executed_lines.iter().copied().collect();
            let mut all_lines: Vec<u32> = executed.iter().copied().collect();
            all_lines.extend(&file.missing_lines);
            all_lines.sort_unstable();
            all_lines.dedup();

            let lines = all_lines
                .into_iter()
                .map(|line| LineCoverage {
                    line,
                    count: u64::from(executed.contains(&line)),
                })
                .collect();
            report.files.insert(
                file_path.clone(),
                FileCoverage {
                    path: file_path,
                    lines,
                    ..Default::default()
                },
            );
        }
        Ok(report.finalize())
    }
}
