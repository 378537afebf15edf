//! Unit-test builder.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use nit_adapters::AdapterRegistry;
use nit_core::{Agent, GlobalMemory, TaskInput, TaskOutput};
use nit_llm::{ContextAssembler, GenerationRequest, LlmEngine, PromptTemplate};

use super::common::{
    clean_code_blocks, context_to_template_data, memory_hints, record_outcome, request_metadata,
    validate_and_retry, BuildResult, BuilderConfig,
};

#[derive(Debug, Deserialize)]
struct UnitBuildTask {
    source_file: String,
    framework: String,
    #[serde(default)]
    output_file: String,
}

pub struct UnitBuilder {
    engine: Arc<dyn LlmEngine>,
    registry: Arc<AdapterRegistry>,
    memory: Option<Arc<GlobalMemory>>,
    project_root: PathBuf,
    config: BuilderConfig,
}

impl UnitBuilder {
    pub fn new(
        engine: Arc<dyn LlmEngine>,
        registry: Arc<AdapterRegistry>,
        memory: Option<Arc<GlobalMemory>>,
        project_root: PathBuf,
    ) -> Self {
        Self {
            engine,
            registry,
            memory,
            project_root,
            config: BuilderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BuilderConfig) -> Self {
        self.config = config;
        self
    }

    async fn build(&self, task: UnitBuildTask) -> Result<BuildResult, String> {
        // Adapter first: a missing or undetected framework fails fast.
        let adapter = self
            .registry
            .get_test_adapter(&task.framework)
            .ok_or_else(|| format!("Adapter unavailable: {}", task.framework))?;
        if !adapter.detect(&self.project_root) {
            return Err(format!(
                "Adapter unavailable: {} is not set up in {}",
                task.framework,
                self.project_root.display()
            ));
        }

        let token_engine = self.engine.clone();
        let assembler = ContextAssembler::new(&self.project_root)
            .with_max_tokens(self.config.max_context_tokens)
            .with_token_counter(move |text| token_engine.count_tokens(text));
        let context = assembler
            .assemble(&task.source_file)
            .map_err(|e| e.to_string())?;

        let hints = memory_hints(
            self.memory.as_deref(),
            &context.language,
            &task.framework,
        );
        let template = PromptTemplate::unit(&task.framework);
        let messages = template
            .render(&context_to_template_data(&context, &hints))
            .map_err(|e| e.to_string())?;

        let request = GenerationRequest {
            messages,
            metadata: request_metadata(&template.name, "unit-builder", &task.source_file, &task.framework),
            ..Default::default()
        };

        let response = self.engine.generate(request.clone()).await.map_err(|e| e.to_string())?;
        let mut tokens_used = response.total_tokens();
        let model = response.model.clone();
        let mut test_code = clean_code_blocks(&response.text);

        let validation = if self.config.enable_validation {
            let (code, validation) = validate_and_retry(
                &self.engine,
                &adapter,
                &request,
                test_code,
                self.config.max_retries,
                &mut tokens_used,
            )
            .await;
            test_code = code;
            validation
        } else {
            adapter.validate(&test_code)
        };

        if validation.valid && !task.output_file.is_empty() {
            let output_path = self.project_root.join(&task.output_file);
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            std::fs::write(&output_path, &test_code).map_err(|e| e.to_string())?;
            info!("wrote generated test to {}", output_path.display());
        }

        record_outcome(
            self.memory.as_deref(),
            validation.valid,
            "unit_test",
            &task.framework,
            &context.language,
            &validation.errors.join("; "),
        );

        if !validation.valid {
            return Err(format!(
                "generated test failed validation: {}",
                validation.errors.join("; ")
            ));
        }

        Ok(BuildResult {
            test_code,
            validation_passed: true,
            tokens_used,
            output_file: task.output_file,
            model,
        })
    }
}

#[async_trait]
impl Agent for UnitBuilder {
    fn name(&self) -> &str {
        "unit-builder"
    }

    fn description(&self) -> &str {
        "Generate unit tests for a source file with an LLM"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let mut build_task: UnitBuildTask = match serde_json::from_value(task.context.clone()) {
            Ok(parsed) => parsed,
            Err(e) => return TaskOutput::failed_with(format!("bad unit build task: {e}")),
        };
        if build_task.source_file.is_empty() {
            build_task.source_file = task.target.clone();
        }

        match self.build(build_task).await {
            Ok(result) => TaskOutput::completed(json!({
                "test_code": result.test_code,
                "validation_passed": result.validation_passed,
                "tokens_used": result.tokens_used,
                "output_file": result.output_file,
                "model": result.model,
            })),
            Err(e) => TaskOutput::failed_with(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nit_llm::{LlmError, LlmMessage, LlmResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RecordingEngine {
        responses: Mutex<Vec<String>>,
        seen_prompts: Mutex<Vec<Vec<LlmMessage>>>,
        calls: AtomicUsize,
    }

    impl RecordingEngine {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(str::to_string).collect()),
                seen_prompts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmEngine for RecordingEngine {
        async fn generate(&self, request: GenerationRequest) -> Result<LlmResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_prompts.lock().unwrap().push(request.messages.clone());
            let text = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "def test_default():\n    assert True\n".into());
            Ok(LlmResponse {
                text,
                model: "recording".into(),
                prompt_tokens: 120,
                completion_tokens: 40,
            })
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    fn python_project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("conftest.py"), "").unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(
            src.join("calc.py"),
            "def add(a: int, b: int) -> int:\n    return a + b\n",
        )
        .unwrap();
        dir
    }

    fn builder_for(dir: &tempfile::TempDir, engine: Arc<RecordingEngine>) -> UnitBuilder {
        UnitBuilder::new(
            engine,
            Arc::new(AdapterRegistry::new()),
            Some(Arc::new(GlobalMemory::open(dir.path()).unwrap())),
            dir.path().to_path_buf(),
        )
    }

    #[tokio::test]
    async fn generates_validates_and_writes() {
        let dir = python_project();
        let engine = Arc::new(RecordingEngine::new(vec![
            "```python\ndef test_add():\n    from src.calc import add\n    assert add(1, 2) == 3\n```",
        ]));
        let builder = builder_for(&dir, engine.clone());

        let output = builder
            .run(TaskInput::new("build_unit_test", "src/calc.py").with_context(json!({
                "source_file": "src/calc.py",
                "framework": "pytest",
                "output_file": "tests/test_calc.py",
            })))
            .await;

        assert!(output.is_completed(), "errors: {:?}", output.errors);
        assert_eq!(output.result["validation_passed"], true);
        // Fences were stripped before writing.
        let written = std::fs::read_to_string(dir.path().join("tests/test_calc.py")).unwrap();
        assert!(!written.contains("```"));
        assert!(written.contains("def test_add"));
        assert_eq!(output.result["model"], "recording");
        assert_eq!(output.result["tokens_used"], 160);
    }

    #[tokio::test]
    async fn invalid_code_retried_with_feedback() {
        let dir = python_project();
        let engine = Arc::new(RecordingEngine::new(vec![
            "this is not python at all (",
            "def test_add():\n    assert True\n",
        ]));
        let builder = builder_for(&dir, engine.clone());

        let output = builder
            .run(TaskInput::new("build_unit_test", "src/calc.py").with_context(json!({
                "source_file": "src/calc.py",
                "framework": "pytest",
            })))
            .await;

        assert!(output.is_completed());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        // The retry prompt carried the error feedback.
        let prompts = engine.seen_prompts.lock().unwrap();
        let retry_prompt = &prompts[1];
        assert!(retry_prompt.iter().any(|m| m.role == "assistant"));
        assert!(retry_prompt
            .iter()
            .any(|m| m.role == "user" && m.content.contains("errors")));
    }

    #[tokio::test]
    async fn missing_adapter_fails() {
        let dir = python_project();
        let engine = Arc::new(RecordingEngine::new(vec![]));
        let builder = builder_for(&dir, engine);

        let output = builder
            .run(TaskInput::new("build_unit_test", "src/calc.py").with_context(json!({
                "source_file": "src/calc.py",
                "framework": "not-a-framework",
            })))
            .await;
        assert!(!output.is_completed());
        assert!(output.errors[0].contains("Adapter unavailable"));
    }

    #[tokio::test]
    async fn undetected_framework_fails() {
        let dir = python_project();
        let engine = Arc::new(RecordingEngine::new(vec![]));
        let builder = builder_for(&dir, engine);

        // vitest is registered but this is a Python project.
        let output = builder
            .run(TaskInput::new("build_unit_test", "src/calc.py").with_context(json!({
                "source_file": "src/calc.py",
                "framework": "vitest",
            })))
            .await;
        assert!(!output.is_completed());
    }

    #[tokio::test]
    async fn outcome_recorded_in_memory() {
        let dir = python_project();
        let memory = Arc::new(GlobalMemory::open(dir.path()).unwrap());
        let engine = Arc::new(RecordingEngine::new(vec![
            "def test_add():\n    assert True\n",
        ]));
        let builder = UnitBuilder::new(
            engine,
            Arc::new(AdapterRegistry::new()),
            Some(memory.clone()),
            dir.path().to_path_buf(),
        );

        builder
            .run(TaskInput::new("build_unit_test", "src/calc.py").with_context(json!({
                "source_file": "src/calc.py",
                "framework": "pytest",
            })))
            .await;

        assert_eq!(memory.stats().successful, 1);
        assert!(memory
            .get_known_patterns(Some("pytest"))
            .iter()
            .any(|p| p.pattern == "unit_test:pytest"));
    }
}
