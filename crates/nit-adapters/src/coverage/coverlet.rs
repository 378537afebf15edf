//! Coverlet (.NET) adapter, reading coverlet's JSON report: modules →
//! documents → classes → methods → per-line hit counts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::detect::any_file_matching;
use crate::process::run_tool;
use crate::traits::CoverageAdapter;
use crate::types::{AdapterError, CoverageReport, FileCoverage, FunctionCoverage, LineCoverage};

pub struct CoverletAdapter;

fn parse_coverlet(json: &Value) -> CoverageReport {
    let mut report = CoverageReport::default();
    let Some(modules) = json.as_object() else {
        return report;
    };

    for documents in modules.values() {
        let Some(documents) = documents.as_object() else {
            continue;
        };
        for (doc_path, classes) in documents {
            let file = report
                .files
                .entry(doc_path.clone())
                .or_insert_with(|| FileCoverage {
                    path: doc_path.clone(),
                    ..Default::default()
                });
            let Some(classes) = classes.as_object() else {
                continue;
            };
            for methods in classes.values() {
                let Some(methods) = methods.as_object() else {
                    continue;
                };
                for (method_name, method) in methods {
                    let lines = method.get("Lines").and_then(|l| l.as_object());
                    let mut first_line = u32::MAX;
                    let mut hit_any = 0u64;
                    if let Some(lines) = lines {
                        for (line_no, count) in lines {
                            let Ok(line) = line_no.parse::<u32>() else { continue };
                            let count = count.as_u64().unwrap_or(0);
                            first_line = first_line.min(line);
                            hit_any = hit_any.max(count.min(1));
                            match file.lines.iter().position(|l| l.line == line) {
                                Some(index) => {
                                    let existing = &mut file.lines[index];
                                    existing.count = existing.count.max(count);
                                }
                                None => file.lines.push(LineCoverage { line, count }),
                            }
                        }
                    }
                    if first_line != u32::MAX {
                        file.functions.push(FunctionCoverage {
                            name: method_name.clone(),
                            line: first_line,
                            count: hit_any,
                        });
                    }
                }
            }
        }
    }

    for file in report.files.values_mut() {
        file.lines.sort_by_key(|l| l.line);
    }
    report.finalize()
}

#[async_trait]
impl CoverageAdapter for CoverletAdapter {
    fn name(&self) -> &'static str {
        "coverlet"
    }

    fn language(&self) -> &'static str {
        "csharp"
    }

    fn detect(&self, root: &Path) -> bool {
        any_file_matching(root, "*.csproj", 3) || any_file_matching(root, "coverage.json", 3)
    }

    async fn run_coverage(
        &self,
        root: &Path,
        _test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
    ) -> Result<CoverageReport, AdapterError> {
        match run_tool(
            "dotnet",
            &["test", "--nologo", "/p:CollectCoverage=true", "/p:CoverletOutputFormat=json"],
            root,
            timeout_secs,
        )
        .await
        {
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
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| AdapterError::ReportParse(format!("coverlet JSON: {e}")))?;
        Ok(parse_coverlet(&json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_coverlet_document() {
        let json: Value = serde_json::from_str(
            r#"{
            "Tests.dll": {
                "src/Calc.cs": {
                    "Calc": {
                        "Add(int, int)": {"Lines": {"3": 5, "4": 5}},
                        "Div(int, int)": {"Lines": {"8": 0, "9": 0}}
                    }
                }
            }
        }"#,
        )
        .unwrap();
        let report = parse_coverlet(&json);
        let file = &report.files["src/Calc.cs"];
        assert_eq!(file.lines.len(), 4);
        assert_eq!(file.functions.len(), 2);
        assert!((report.overall_line_coverage - 0.5).abs() < 1e-9);
        assert!((report.overall_function_coverage - 0.5).abs() < 1e-9);
    }

    #[test]
    fn missing_file_is_empty() {
        let report = CoverletAdapter
            .parse_coverage_file(Path::new("/nonexistent/coverage.json"))
            .unwrap();
        assert!(report.files.is_empty());
    }
}
