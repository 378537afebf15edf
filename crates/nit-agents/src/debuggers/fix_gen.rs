//! Fix generator: LLM produces the complete corrected file.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use nit_core::{Agent, TaskInput, TaskOutput};
use nit_llm::{GenerationRequest, LlmEngine, PromptTemplate};

use super::root_cause::RootCause;
use crate::healers::self_healing::clean_code_blocks;

/// A candidate fix for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedFix {
    pub file_path: String,
    pub fixed_code: String,
    pub summary: String,
    pub confidence: f64,
}

pub struct FixGenerator {
    engine: Arc<dyn LlmEngine>,
    project_root: PathBuf,
}

impl FixGenerator {
    pub fn new(engine: Arc<dyn LlmEngine>, project_root: PathBuf) -> Self {
        Self {
            engine,
            project_root,
        }
    }

    pub async fn generate_fix(
        &self,
        file_path: &str,
        cause: &RootCause,
    ) -> Result<GeneratedFix, String> {
        let source = std::fs::read_to_string(self.project_root.join(file_path))
            .map_err(|e| format!("cannot read {file_path}: {e}"))?;

        let template = PromptTemplate::fix_generation();
        let messages = template
            .render(&json!({
                "root_cause": format!("{} ({})", cause.explanation, cause.location),
                "file_path": file_path,
                "source_code": source,
            }))
            .map_err(|e| e.to_string())?;

        let response = self
            .engine
            .generate(GenerationRequest::from_messages(messages))
            .await
            .map_err(|e| e.to_string())?;

        let fixed_code = clean_code_blocks(&response.text);
        if fixed_code.trim().is_empty() {
            return Err("fix generation produced empty output".into());
        }

        Ok(GeneratedFix {
            file_path: file_path.to_string(),
            fixed_code,
            summary: cause.explanation.chars().take(200).collect(),
            confidence: cause.confidence,
        })
    }
}

#[async_trait]
impl Agent for FixGenerator {
    fn name(&self) -> &str {
        "fix-generator"
    }

    fn description(&self) -> &str {
        "Generate a minimal fix for an analyzed root cause"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let cause: RootCause = match task
            .context
            .get("root_cause")
            .cloned()
            .map(serde_json::from_value)
        {
            Some(Ok(cause)) => cause,
            Some(Err(e)) => return TaskOutput::failed_with(format!("bad root_cause payload: {e}")),
            None => return TaskOutput::failed_with("root_cause missing from task context"),
        };
        let file_path = task
            .context
            .get("file_path")
            .and_then(|v| v.as_str())
            .unwrap_or(&task.target)
            .to_string();

        match self.generate_fix(&file_path, &cause).await {
            Ok(fix) => TaskOutput::completed(json!({ "fix": fix })),
            Err(e) => TaskOutput::failed_with(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nit_llm::{LlmError, LlmResponse};

    struct FixEngine;

    #[async_trait]
    impl LlmEngine for FixEngine {
        async fn generate(&self, _request: GenerationRequest) -> Result<LlmResponse, LlmError> {
            Ok(LlmResponse {
                text: "```python\ndef divide(a, b):\n    if b == 0:\n        raise ValueError('division by zero')\n    return a / b\n```".into(),
                model: "fix".into(),
                ..Default::default()
            })
        }

        fn model_name(&self) -> &str {
            "fix"
        }
    }

    #[tokio::test]
    async fn fix_generated_with_fences_stripped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("calc.py"), "def divide(a, b):\n    return a / b\n")
            .unwrap();

        let generator = FixGenerator::new(Arc::new(FixEngine), dir.path().to_path_buf());
        let cause = RootCause {
            category: "logic".into(),
            location: "calc.py:2".into(),
            explanation: "missing zero check".into(),
            confidence: 0.9,
        };
        let fix = generator.generate_fix("calc.py", &cause).await.unwrap();
        assert!(!fix.fixed_code.contains("```"));
        assert!(fix.fixed_code.contains("ValueError"));
        assert_eq!(fix.file_path, "calc.py");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let generator = FixGenerator::new(Arc::new(FixEngine), dir.path().to_path_buf());
        let cause = RootCause {
            category: "logic".into(),
            location: String::new(),
            explanation: "x".into(),
            confidence: 0.5,
        };
        assert!(generator.generate_fix("absent.py", &cause).await.is_err());
    }
}
