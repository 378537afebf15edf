//! Bug detector: triages a failing run into structured bug reports.

use std::path::PathBuf;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use nit_adapters::{CaseStatus, RunResult};
use nit_core::{Agent, TaskInput, TaskOutput};

/// A structured bug extracted from a failing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugReport {
    pub id: String,
    pub title: String,
    pub failing_test: String,
    pub failure_message: String,
    /// File and line the failure points at, when extractable.
    pub suspect_file: String,
    pub suspect_line: Option<usize>,
}

fn location_regexes() -> Vec<Regex> {
    vec![
        // Python tracebacks: File "src/calc.py", line 12
        Regex::new(r#"File "([^"]+)", line (\d+)"#).unwrap(),
        // JS stacks: at fn (src/calc.ts:12:5)
        Regex::new(r"at [^(]*\(([^():]+):(\d+):\d+\)").unwrap(),
        // Rust/Go style: src/calc.rs:12
        Regex::new(r"([\w./-]+\.(?:rs|go|py|ts|js|java|c|cpp)):(\d+)").unwrap(),
    ]
}

/// Pull the most plausible source location out of a failure message.
pub fn extract_location(message: &str) -> (String, Option<usize>) {
    for re in location_regexes() {
        if let Some(caps) = re.captures(message) {
            let file = caps[1].to_string();
            // Skip frames inside test files; the bug is usually in the
            // code under test.
            if !crate::analyzers::diff::is_test_file(&file) {
                return (file, caps[2].parse().ok());
            }
        }
    }
    // Fall back to the first location even if it is a test frame.
    for re in location_regexes() {
        if let Some(caps) = re.captures(message) {
            return (caps[1].to_string(), caps[2].parse().ok());
        }
    }
    (String::new(), None)
}

/// Turn a failing run into one bug report per failing case.
pub fn detect_bugs(run_result: &RunResult) -> Vec<BugReport> {
    run_result
        .test_cases
        .iter()
        .filter(|c| matches!(c.status, CaseStatus::Failed | CaseStatus::Error))
        .map(|case| {
            let (suspect_file, suspect_line) = extract_location(&case.failure_message);
            BugReport {
                id: Uuid::new_v4().to_string(),
                title: format!("Failing test: {}", case.name),
                failing_test: case.name.clone(),
                failure_message: case.failure_message.clone(),
                suspect_file,
                suspect_line,
            }
        })
        .collect()
}

pub struct BugDetector;

#[async_trait]
impl Agent for BugDetector {
    fn name(&self) -> &str {
        "bug-detector"
    }

    fn description(&self) -> &str {
        "Triage failing test runs into structured bug reports"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let _root = PathBuf::from(&task.target);
        let run_result: RunResult = match task
            .context
            .get("run_result")
            .cloned()
            .map(serde_json::from_value)
        {
            Some(Ok(result)) => result,
            Some(Err(e)) => return TaskOutput::failed_with(format!("bad run_result: {e}")),
            None => return TaskOutput::failed_with("run_result missing from task context"),
        };

        let bugs = detect_bugs(&run_result);
        TaskOutput::completed(json!({ "bugs": bugs }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nit_adapters::CaseResult;

    #[test]
    fn failing_cases_become_bugs_with_locations() {
        let result = RunResult::from_cases(
            vec![
                CaseResult {
                    name: "test_divide".into(),
                    status: CaseStatus::Failed,
                    duration_ms: 2.0,
                    failure_message:
                        "Traceback:\n  File \"src/calc.py\", line 12, in divide\nZeroDivisionError"
                            .into(),
                    file_path: "tests/test_calc.py".into(),
                },
                CaseResult {
                    name: "test_ok".into(),
                    status: CaseStatus::Passed,
                    duration_ms: 1.0,
                    failure_message: String::new(),
                    file_path: String::new(),
                },
            ],
            String::new(),
        );

        let bugs = detect_bugs(&result);
        assert_eq!(bugs.len(), 1);
        assert_eq!(bugs[0].failing_test, "test_divide");
        assert_eq!(bugs[0].suspect_file, "src/calc.py");
        assert_eq!(bugs[0].suspect_line, Some(12));
    }

    #[test]
    fn test_frames_skipped_when_source_frame_present() {
        let message = "File \"tests/test_calc.py\", line 5, in test_divide\n\
                       File \"src/calc.py\", line 12, in divide\nZeroDivisionError";
        let (file, line) = extract_location(message);
        assert_eq!(file, "src/calc.py");
        assert_eq!(line, Some(12));
    }

    #[test]
    fn js_stack_location_extracted() {
        let (file, line) = extract_location("Error: boom\n    at divide (src/calc.ts:8:11)");
        assert_eq!(file, "src/calc.ts");
        assert_eq!(line, Some(8));
    }
}
