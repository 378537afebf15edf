//! Integration-test builder: the unit pipeline augmented with the
//! integration-dependency analysis and its fixture recommendations.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use nit_adapters::AdapterRegistry;
use nit_core::{Agent, GlobalMemory, TaskInput, TaskOutput};
use nit_llm::{ContextAssembler, GenerationRequest, LlmEngine, PromptTemplate};
use nit_parsing::extract_from_file;

use super::common::{
    clean_code_blocks, context_to_template_data, memory_hints, record_outcome, request_metadata,
    validate_and_retry, BuildResult, BuilderConfig,
};
use crate::analyzers::integration_deps::analyze_integration_deps;

#[derive(Debug, Deserialize)]
struct IntegrationBuildTask {
    source_file: String,
    framework: String,
    #[serde(default)]
    output_file: String,
}

pub struct IntegrationBuilder {
    engine: Arc<dyn LlmEngine>,
    registry: Arc<AdapterRegistry>,
    memory: Option<Arc<GlobalMemory>>,
    project_root: PathBuf,
    config: BuilderConfig,
}

impl IntegrationBuilder {
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

    async fn build(&self, task: IntegrationBuildTask) -> Result<BuildResult, String> {
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

        // The integration analysis is required input for this builder.
        let source_path = self.project_root.join(&task.source_file);
        let parse_result = extract_from_file(&source_path).map_err(|e| e.to_string())?;
        let language = parse_result.language.clone();
        let dependencies = analyze_integration_deps(&parse_result, &language);

        let token_engine = self.engine.clone();
        let assembler = ContextAssembler::new(&self.project_root)
            .with_max_tokens(self.config.max_context_tokens)
            .with_token_counter(move |text| token_engine.count_tokens(text));
        let context = assembler
            .assemble(&task.source_file)
            .map_err(|e| e.to_string())?;

        let hints = memory_hints(self.memory.as_deref(), &context.language, &task.framework);
        let mut data = context_to_template_data(&context, &hints);
        data["dependencies"] = json!(dependencies
            .iter()
            .map(|d| json!({
                "kind": serde_json::to_value(d.kind).unwrap_or_default(),
                "name": d.module,
                "fixture": d.suggested_fixture,
            }))
            .collect::<Vec<_>>());

        let template = PromptTemplate::integration(&task.framework);
        let messages = template.render(&data).map_err(|e| e.to_string())?;
        let request = GenerationRequest {
            messages,
            metadata: request_metadata(
                &template.name,
                "integration-builder",
                &task.source_file,
                &task.framework,
            ),
            ..Default::default()
        };

        let response = self.engine.generate(request.clone()).await.map_err(|e| e.to_string())?;
        let mut tokens_used = response.total_tokens();
        let model = response.model.clone();
        let code = clean_code_blocks(&response.text);

        let (test_code, validation) = validate_and_retry(
            &self.engine,
            &adapter,
            &request,
            code,
            self.config.max_retries,
            &mut tokens_used,
        )
        .await;

        if validation.valid && !task.output_file.is_empty() {
            let output_path = self.project_root.join(&task.output_file);
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            std::fs::write(&output_path, &test_code).map_err(|e| e.to_string())?;
        }

        record_outcome(
            self.memory.as_deref(),
            validation.valid,
            "integration_test",
            &task.framework,
            &language,
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
impl Agent for IntegrationBuilder {
    fn name(&self) -> &str {
        "integration-builder"
    }

    fn description(&self) -> &str {
        "Generate integration tests with dependency-aware fixtures"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let build_task: IntegrationBuildTask = match serde_json::from_value(task.context.clone()) {
            Ok(parsed) => parsed,
            Err(e) => return TaskOutput::failed_with(format!("bad integration build task: {e}")),
        };
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
