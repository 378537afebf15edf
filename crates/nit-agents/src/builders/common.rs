//! The pipeline every builder shares: context → prompt (with memory
//! hints) → generate → strip fences → validation loop → memory update.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use nit_adapters::{TestAdapter, ValidationResult};
use nit_core::GlobalMemory;
use nit_llm::{AssembledContext, GenerationRequest, LlmEngine, LlmMessage};

pub use crate::healers::self_healing::clean_code_blocks;

/// Configuration shared by builders.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub max_context_tokens: usize,
    pub enable_validation: bool,
    pub max_retries: u32,
    pub enable_self_healing: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 8000,
            enable_validation: true,
            max_retries: 3,
            enable_self_healing: false,
        }
    }
}

/// What a builder hands back on completion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildResult {
    pub test_code: String,
    pub validation_passed: bool,
    pub tokens_used: u32,
    pub output_file: String,
    pub model: String,
}

/// Compose the memory hint block injected into the system prompt:
/// known-good patterns for the language, failed patterns to avoid, and
/// the stored convention profile.
pub fn memory_hints(memory: Option<&GlobalMemory>, language: &str, framework: &str) -> String {
    let Some(memory) = memory else {
        return String::new();
    };
    let mut sections = Vec::new();

    let known = memory.get_known_patterns(Some(language));
    if !known.is_empty() {
        let lines: Vec<String> = known.iter().take(8).map(|p| format!("- {}", p.pattern)).collect();
        sections.push(format!("Patterns that worked before:\n{}", lines.join("\n")));
    }

    let failed = memory.get_failed_patterns(Some(framework));
    if !failed.is_empty() {
        let lines: Vec<String> = failed
            .iter()
            .take(5)
            .map(|p| format!("- {} ({})", p.pattern, p.reason))
            .collect();
        sections.push(format!("Avoid these patterns:\n{}", lines.join("\n")));
    }

    let conventions = memory.conventions();
    if let (Some(naming), Some(assertion)) =
        (conventions.get("naming_style"), conventions.get("assertion_style"))
    {
        sections.push(format!(
            "Project conventions: naming={}, assertions={}",
            naming.as_str().unwrap_or("unknown"),
            assertion.as_str().unwrap_or("unknown")
        ));
    }

    sections.join("\n\n")
}

/// Serialize an assembled context into the JSON the prompt templates
/// consume.
pub fn context_to_template_data(
    context: &AssembledContext,
    hints: &str,
) -> serde_json::Value {
    let test_patterns = context.test_patterns.as_ref().map(|p| {
        json!({
            "naming_style": p.naming_style,
            "assertion_style": p.assertion_style,
            "mocking_patterns": p.mocking_patterns,
            "sample_test": p.sample_test,
        })
    });
    json!({
        "source_path": context.source_path,
        "source_code": context.source_code,
        "language": context.language,
        "function_signatures": context.function_signatures(),
        "test_patterns": test_patterns,
        "memory_hints": if hints.is_empty() { serde_json::Value::Null } else { json!(hints) },
    })
}

/// Build the request metadata that attributes usage to this builder.
pub fn request_metadata(
    template_name: &str,
    builder_name: &str,
    source_file: &str,
    framework: &str,
) -> HashMap<String, String> {
    HashMap::from([
        ("nit_template_name".to_string(), template_name.to_string()),
        ("nit_builder_name".to_string(), builder_name.to_string()),
        ("nit_source_file".to_string(), source_file.to_string()),
        ("nit_framework".to_string(), framework.to_string()),
    ])
}

/// Validate; on failure, append the assistant's code and an error-report
/// user message, regenerate, and try again — up to `max_retries`.
pub async fn validate_and_retry(
    engine: &Arc<dyn LlmEngine>,
    adapter: &Arc<dyn TestAdapter>,
    initial_request: &GenerationRequest,
    initial_code: String,
    max_retries: u32,
    tokens_used: &mut u32,
) -> (String, ValidationResult) {
    let mut current_code = initial_code;
    let mut validation = adapter.validate(&current_code);

    for attempt in 0..max_retries {
        if validation.valid {
            info!("generated test validated on attempt {}", attempt + 1);
            return (current_code, validation);
        }
        if attempt + 1 == max_retries {
            break;
        }

        info!(
            "validation failed on attempt {} ({} errors), regenerating",
            attempt + 1,
            validation.errors.len()
        );
        let mut messages = initial_request.messages.clone();
        messages.push(LlmMessage::assistant(current_code.clone()));
        messages.push(LlmMessage::user(format!(
            "The generated test has errors:\n\n{}\n\nPlease fix the errors and output the corrected test code.",
            validation.errors.join("\n")
        )));

        let retry_request = GenerationRequest {
            messages,
            metadata: initial_request.metadata.clone(),
            ..Default::default()
        };
        match engine.generate(retry_request).await {
            Ok(response) => {
                *tokens_used += response.total_tokens();
                current_code = clean_code_blocks(&response.text);
                validation = adapter.validate(&current_code);
            }
            Err(e) => {
                warn!("regeneration failed, keeping last candidate: {e}");
                break;
            }
        }
    }

    if !validation.valid {
        warn!("validation exhausted after {max_retries} attempts");
    }
    (current_code, validation)
}

/// Record the generation outcome in memory and bump the rolling stats.
pub fn record_outcome(
    memory: Option<&GlobalMemory>,
    successful: bool,
    domain: &str,
    framework: &str,
    language: &str,
    error_summary: &str,
) {
    let Some(memory) = memory else { return };
    let context = HashMap::from([
        ("framework".to_string(), json!(framework)),
        ("language".to_string(), json!(language)),
    ]);

    let result = if successful {
        memory.add_known_pattern(format!("{domain}:{framework}"), context)
    } else {
        memory.add_failed_pattern(
            format!("{domain}:{framework}"),
            error_summary.chars().take(300).collect::<String>(),
        )
    };
    if let Err(e) = result {
        warn!("failed to record generation outcome: {e}");
    }
    if let Err(e) = memory.update_stats(successful, 1) {
        warn!("failed to update memory stats: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nit_llm::{LlmError, LlmResponse};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct ScriptedEngine {
        responses: std::sync::Mutex<Vec<String>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedEngine {
        pub(crate) fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: std::sync::Mutex::new(
                    responses.into_iter().rev().map(str::to_string).collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmEngine for ScriptedEngine {
        async fn generate(&self, _request: GenerationRequest) -> Result<LlmResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "def test_fallback():\n    assert True\n".into());
            Ok(LlmResponse {
                text,
                model: "scripted".into(),
                prompt_tokens: 100,
                completion_tokens: 50,
            })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct AlwaysDetectedPytest;

    #[async_trait]
    impl TestAdapter for AlwaysDetectedPytest {
        fn name(&self) -> &'static str {
            "pytest"
        }
        fn language(&self) -> &'static str {
            "python"
        }
        fn detect(&self, _root: &Path) -> bool {
            true
        }
        fn test_patterns(&self) -> Vec<&'static str> {
            vec!["**/test_*.py"]
        }
        fn prompt_template(&self) -> &'static str {
            "unit_pytest"
        }
        async fn run_tests(
            &self,
            _root: &Path,
            _test_files: Option<&[PathBuf]>,
            _timeout_secs: u64,
            _collect_coverage: bool,
        ) -> Result<nit_adapters::RunResult, nit_adapters::AdapterError> {
            Ok(nit_adapters::RunResult::from_counts(1, 0, 0, 0))
        }
        fn validate(&self, code: &str) -> ValidationResult {
            if code.contains("def test_") {
                ValidationResult::ok()
            } else {
                ValidationResult::invalid(vec!["no test functions".into()])
            }
        }
    }

    #[tokio::test]
    async fn retry_loop_feeds_errors_back() {
        let engine: Arc<dyn LlmEngine> = Arc::new(ScriptedEngine::new(vec![
            "def test_fixed():\n    assert True\n",
        ]));
        let adapter: Arc<dyn TestAdapter> = Arc::new(AlwaysDetectedPytest);
        let request = GenerationRequest::from_messages(vec![LlmMessage::user("generate")]);
        let mut tokens = 0;

        let (code, validation) = validate_and_retry(
            &engine,
            &adapter,
            &request,
            "not a test at all".into(),
            3,
            &mut tokens,
        )
        .await;

        assert!(validation.valid);
        assert!(code.contains("def test_fixed"));
        assert_eq!(tokens, 150);
    }

    #[tokio::test]
    async fn retry_loop_gives_up_after_budget() {
        let engine: Arc<dyn LlmEngine> =
            Arc::new(ScriptedEngine::new(vec!["still broken", "still broken"]));
        let adapter: Arc<dyn TestAdapter> = Arc::new(AlwaysDetectedPytest);
        let request = GenerationRequest::from_messages(vec![LlmMessage::user("generate")]);
        let mut tokens = 0;

        let (_, validation) =
            validate_and_retry(&engine, &adapter, &request, "broken".into(), 2, &mut tokens).await;
        assert!(!validation.valid);
    }

    #[test]
    fn memory_hints_include_known_and_failed() {
        let dir = tempfile::tempdir().unwrap();
        let memory = GlobalMemory::open(dir.path()).unwrap();
        memory
            .add_known_pattern(
                "assertion_style:assert",
                HashMap::from([("language".into(), json!("python"))]),
            )
            .unwrap();
        memory
            .add_failed_pattern("unit_test:pytest", "syntax error in fixture")
            .unwrap();

        let hints = memory_hints(Some(&memory), "python", "pytest");
        assert!(hints.contains("assertion_style:assert"));
        assert!(hints.contains("Avoid these patterns"));
        assert!(hints.contains("syntax error in fixture"));
    }

    #[test]
    fn outcome_recording_updates_stats() {
        let dir = tempfile::tempdir().unwrap();
        let memory = GlobalMemory::open(dir.path()).unwrap();
        record_outcome(Some(&memory), true, "unit_test", "pytest", "python", "");
        record_outcome(Some(&memory), false, "unit_test", "pytest", "python", "boom");

        let stats = memory.stats();
        assert_eq!(stats.total_generated, 2);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);
        assert!(!memory.get_failed_patterns(Some("pytest")).is_empty());
    }
}
