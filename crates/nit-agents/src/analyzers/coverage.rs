//! Coverage analyzer: turns a raw coverage report into prioritized
//! per-function gaps.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use nit_core::{Agent, TaskInput, TaskOutput};
use nit_adapters::CoverageReport;
use nit_parsing::extract_from_file;

use super::code::calculate_complexity;

/// How urgently a gap should be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl GapPriority {
    fn rank(self) -> u8 {
        match self {
            GapPriority::Critical => 0,
            GapPriority::High => 1,
            GapPriority::Medium => 2,
            GapPriority::Low => 3,
        }
    }
}

/// One under-tested function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionGap {
    pub function_name: String,
    pub file_path: String,
    pub priority: GapPriority,
    pub complexity: u32,
    /// Line coverage of the function in percent (0-100).
    pub coverage_percentage: f64,
}

/// All gaps for a project, ordered most-urgent first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageGapReport {
    pub function_gaps: Vec<FunctionGap>,
    pub overall_line_coverage: f64,
}

fn priority_for(complexity: u32, coverage_percentage: f64) -> GapPriority {
    match (complexity, coverage_percentage) {
        (c, p) if c > 10 && p < 20.0 => GapPriority::Critical,
        (c, p) if c > 5 && p < 50.0 => GapPriority::High,
        (_, p) if p < 80.0 => GapPriority::Medium,
        _ => GapPriority::Low,
    }
}

/// Deterministic gap ordering: priority, then higher complexity, then
/// lower coverage, then name.
pub fn sort_gaps(gaps: &mut [FunctionGap]) {
    gaps.sort_by(|a, b| {
        a.priority
            .rank()
            .cmp(&b.priority.rank())
            .then_with(|| b.complexity.cmp(&a.complexity))
            .then_with(|| {
                a.coverage_percentage
                    .partial_cmp(&b.coverage_percentage)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.function_name.cmp(&b.function_name))
    });
}

/// Join a coverage report against parsed sources to produce
/// function-level gaps.
pub fn analyze_coverage(root: &std::path::Path, report: &CoverageReport) -> CoverageGapReport {
    let mut gaps = Vec::new();

    for (file_path, file_coverage) in &report.files {
        let abs = if std::path::Path::new(file_path).is_absolute() {
            PathBuf::from(file_path)
        } else {
            root.join(file_path)
        };
        let Ok(parsed) = extract_from_file(&abs) else {
            continue;
        };

        let mut consider = |function: &nit_parsing::FunctionInfo, name: String| {
            let covered_lines = file_coverage
                .lines
                .iter()
                .filter(|l| {
                    (l.line as usize) >= function.start_line
                        && (l.line as usize) <= function.end_line
                })
                .collect::<Vec<_>>();
            let coverage_percentage = if covered_lines.is_empty() {
                0.0
            } else {
                let hit = covered_lines.iter().filter(|l| l.count > 0).count();
                hit as f64 / covered_lines.len() as f64 * 100.0
            };
            if coverage_percentage >= 100.0 {
                return;
            }
            let complexity = calculate_complexity(function).cyclomatic;
            gaps.push(FunctionGap {
                function_name: name,
                file_path: file_path.clone(),
                priority: priority_for(complexity, coverage_percentage),
                complexity,
                coverage_percentage,
            });
        };

        for function in &parsed.functions {
            consider(function, function.name.clone());
        }
        for class in &parsed.classes {
            for method in &class.methods {
                consider(method, format!("{}.{}", class.name, method.name));
            }
        }
    }

    sort_gaps(&mut gaps);
    CoverageGapReport {
        function_gaps: gaps,
        overall_line_coverage: report.overall_line_coverage,
    }
}

/// Agent wrapper. Expects a serialized `CoverageReport` in the task
/// context under "coverage_report".
pub struct CoverageAnalyzer;

#[async_trait]
impl Agent for CoverageAnalyzer {
    fn name(&self) -> &str {
        "coverage-analyzer"
    }

    fn description(&self) -> &str {
        "Convert coverage reports into prioritized function gaps"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let root = PathBuf::from(&task.target);
        let report: CoverageReport = match task
            .context
            .get("coverage_report")
            .cloned()
            .map(serde_json::from_value)
        {
            Some(Ok(report)) => report,
            Some(Err(e)) => {
                return TaskOutput::failed_with(format!("bad coverage_report payload: {e}"))
            }
            None => return TaskOutput::failed_with("coverage_report missing from task context"),
        };

        let gap_report = analyze_coverage(&root, &report);
        TaskOutput::completed(json!({
            "function_gaps": gap_report.function_gaps,
            "overall_line_coverage": gap_report.overall_line_coverage,
        }))
    }
}
