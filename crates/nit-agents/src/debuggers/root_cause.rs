//! Root-cause analyzer: LLM over the bug report plus relevant source.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use nit_core::{Agent, TaskInput, TaskOutput};
use nit_llm::{GenerationRequest, LlmEngine, PromptTemplate};

use super::bug_detect::BugReport;

/// The analyzer's conclusion about a bug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCause {
    /// logic | state | concurrency | integration | configuration
    pub category: String,
    pub location: String,
    pub explanation: String,
    pub confidence: f64,
}

/// Parse the `**FIELD**:` response format.
pub fn parse_root_cause(response: &str) -> Option<RootCause> {
    let field = |name: &str| -> Option<String> {
        Regex::new(&format!(r"(?is)\*\*{name}\*\*:\s*(.+?)(?:\*\*|\z)"))
            .ok()?
            .captures(response)
            .map(|c| c[1].trim().to_string())
    };

    Some(RootCause {
        category: field("CATEGORY")?
            .split_whitespace()
            .next()
            .unwrap_or("logic")
            .to_lowercase(),
        location: field("LOCATION").unwrap_or_default(),
        explanation: field("EXPLANATION")?,
        confidence: field("CONFIDENCE")
            .and_then(|c| c.split_whitespace().next().and_then(|v| v.parse().ok()))
            .unwrap_or(0.5),
    })
}

pub struct RootCauseAnalyzer {
    engine: Arc<dyn LlmEngine>,
    project_root: PathBuf,
}

impl RootCauseAnalyzer {
    pub fn new(engine: Arc<dyn LlmEngine>, project_root: PathBuf) -> Self {
        Self {
            engine,
            project_root,
        }
    }

    pub async fn analyze(&self, bug: &BugReport) -> Result<RootCause, String> {
        let source = if bug.suspect_file.is_empty() {
            String::new()
        } else {
            std::fs::read_to_string(self.project_root.join(&bug.suspect_file)).unwrap_or_default()
        };

        let template = PromptTemplate::root_cause();
        let messages = template
            .render(&json!({
                "bug_description": bug.title,
                "failure_output": bug.failure_message,
                "file_path": bug.suspect_file,
                "source_code": source.chars().take(6000).collect::<String>(),
            }))
            .map_err(|e| e.to_string())?;

        let response = self
            .engine
            .generate(GenerationRequest::from_messages(messages))
            .await
            .map_err(|e| e.to_string())?;

        parse_root_cause(&response.text)
            .ok_or_else(|| "root-cause response did not follow the expected format".to_string())
    }
}

#[async_trait]
impl Agent for RootCauseAnalyzer {
    fn name(&self) -> &str {
        "root-cause-analyzer"
    }

    fn description(&self) -> &str {
        "Determine the most likely root cause of a bug"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let bug: BugReport = match task.context.get("bug").cloned().map(serde_json::from_value) {
            Some(Ok(bug)) => bug,
            Some(Err(e)) => return TaskOutput::failed_with(format!("bad bug payload: {e}")),
            None => return TaskOutput::failed_with("bug missing from task context"),
        };
        match self.analyze(&bug).await {
            Ok(cause) => TaskOutput::completed(json!({ "root_cause": cause })),
            Err(e) => TaskOutput::failed_with(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nit_llm::{LlmError, LlmResponse};

    #[test]
    fn response_format_parsed() {
        let response = "\
**CATEGORY**: logic
**LOCATION**: src/calc.py:12
**EXPLANATION**: The divisor is never checked for zero before dividing.
**CONFIDENCE**: 0.85
";
        let cause = parse_root_cause(response).unwrap();
        assert_eq!(cause.category, "logic");
        assert_eq!(cause.location, "src/calc.py:12");
        assert!(cause.explanation.contains("divisor"));
        assert!((cause.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn missing_fields_rejected() {
        assert!(parse_root_cause("no structure at all").is_none());
    }

    struct CannedEngine;

    #[async_trait]
    impl LlmEngine for CannedEngine {
        async fn generate(&self, request: GenerationRequest) -> Result<LlmResponse, LlmError> {
            let prompt: String = request.messages.iter().map(|m| m.content.clone()).collect();
            assert!(prompt.contains("ZeroDivisionError"));
            Ok(LlmResponse {
                text: "**CATEGORY**: logic\n**LOCATION**: src/calc.py:2\n**EXPLANATION**: missing zero check\n**CONFIDENCE**: 0.9".into(),
                model: "canned".into(),
                ..Default::default()
            })
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn analyze_reads_suspect_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("calc.py"), "def divide(a, b):\n    return a / b\n").unwrap();

        let analyzer = RootCauseAnalyzer::new(Arc::new(CannedEngine), dir.path().to_path_buf());
        let bug = BugReport {
            id: "1".into(),
            title: "divide crashes".into(),
            failing_test: "test_divide".into(),
            failure_message: "ZeroDivisionError at src/calc.py:2".into(),
            suspect_file: "src/calc.py".into(),
            suspect_line: Some(2),
        };
        let cause = analyzer.analyze(&bug).await.unwrap();
        assert_eq!(cause.category, "logic");
    }
}
