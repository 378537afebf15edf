//! E2E builder: generates browser tests for routes and flows, runs them
//! when an output file is given, and self-heals selector failures.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use nit_adapters::AdapterRegistry;
use nit_config::AuthSettings;
use nit_core::{Agent, GlobalMemory, TaskInput, TaskOutput};
use nit_llm::{ContextAssembler, GenerationRequest, LlmEngine, PromptTemplate};

use super::common::{
    clean_code_blocks, memory_hints, record_outcome, request_metadata, validate_and_retry,
    BuildResult, BuilderConfig,
};
use crate::healers::self_healing::SelfHealingEngine;

/// Route information handed in by route discovery.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteInfo {
    pub path: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub handler_file: String,
}

#[derive(Debug, Deserialize)]
struct E2eBuildTask {
    #[serde(default)]
    route_path: String,
    #[serde(default)]
    route_info: Option<RouteInfo>,
    #[serde(default)]
    handler_file: String,
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    flow_description: String,
    #[serde(default)]
    output_file: String,
    #[serde(default)]
    auth: Option<AuthSettings>,
    /// playwright (default) or cypress.
    #[serde(default)]
    framework: String,
}

pub struct E2eBuilder {
    engine: Arc<dyn LlmEngine>,
    registry: Arc<AdapterRegistry>,
    memory: Option<Arc<GlobalMemory>>,
    project_root: PathBuf,
    config: BuilderConfig,
}

impl E2eBuilder {
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
            // Self-healing is on by default for E2E.
            config: BuilderConfig {
                enable_self_healing: true,
                ..Default::default()
            },
        }
    }

    pub fn with_config(mut self, config: BuilderConfig) -> Self {
        self.config = config;
        self
    }

    async fn build(&self, task: E2eBuildTask) -> Result<BuildResult, String> {
        let framework = if task.framework.is_empty() {
            "playwright".to_string()
        } else {
            task.framework.clone()
        };
        let adapter = self
            .registry
            .get_test_adapter(&framework)
            .ok_or_else(|| format!("Adapter unavailable: {framework}"))?;
        if !adapter.detect(&self.project_root) {
            warn!(
                "{framework} not detected in {}; the generated test may not run",
                self.project_root.display()
            );
        }

        // Context: the handler source when known, otherwise just the
        // route/flow description.
        let mut data = json!({
            "route_path": if task.route_path.is_empty() {
                task.route_info.as_ref().map(|r| r.path.clone()).unwrap_or_default()
            } else {
                task.route_path.clone()
            },
            "base_url": task.base_url,
            "flow_description": task.flow_description,
        });
        if let Some(auth) = &task.auth {
            data["auth"] = json!({
                "strategy": auth.strategy,
                "login_url": auth.login_url,
            });
        }
        let handler = if task.handler_file.is_empty() {
            task.route_info
                .as_ref()
                .map(|r| r.handler_file.clone())
                .unwrap_or_default()
        } else {
            task.handler_file.clone()
        };
        let mut language = "typescript".to_string();
        if !handler.is_empty() {
            let token_engine = self.engine.clone();
            let assembler = ContextAssembler::new(&self.project_root)
                .with_max_tokens(self.config.max_context_tokens)
                .with_token_counter(move |text| token_engine.count_tokens(text));
            if let Ok(context) = assembler.assemble(&handler) {
                data["source_code"] = json!(context.source_code);
                language = context.language;
            }
        }
        let hints = memory_hints(self.memory.as_deref(), &language, &framework);
        if !hints.is_empty() {
            data["memory_hints"] = json!(hints);
        }

        let template = PromptTemplate::e2e(&framework);
        let messages = template.render(&data).map_err(|e| e.to_string())?;
        let target = if data["route_path"].as_str().unwrap_or("").is_empty() {
            task.flow_description.clone()
        } else {
            data["route_path"].as_str().unwrap_or("").to_string()
        };
        let request = GenerationRequest {
            messages,
            metadata: request_metadata(&template.name, "e2e-builder", &target, &framework),
            ..Default::default()
        };

        let response = self.engine.generate(request.clone()).await.map_err(|e| e.to_string())?;
        let mut tokens_used = response.total_tokens();
        let model = response.model.clone();
        let code = clean_code_blocks(&response.text);

        let (mut test_code, mut validation) = validate_and_retry(
            &self.engine,
            &adapter,
            &request,
            code,
            self.config.max_retries,
            &mut tokens_used,
        )
        .await;

        // Execution + healing path: only when we have somewhere to write
        // the test.
        if validation.valid && self.config.enable_self_healing && !task.output_file.is_empty() {
            let test_path = self.project_root.join(&task.output_file);
            if let Some(parent) = test_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            std::fs::write(&test_path, &test_code).map_err(|e| e.to_string())?;

            match adapter
                .run_tests(&self.project_root, Some(&[test_path.clone()]), 300, false)
                .await
            {
                Ok(run_result) if !run_result.success && run_result.total() > 0 => {
                    info!("generated E2E test fails at runtime, attempting self-healing");
                    let mut healer = SelfHealingEngine::new(self.engine.clone(), adapter.clone());
                    if !task.base_url.is_empty() {
                        healer = healer.with_base_url(&task.base_url);
                    }
                    let healing = healer
                        .heal_test(&test_code, &run_result, &self.project_root, Some(&test_path))
                        .await;
                    for message in &healing.messages {
                        info!("self-healing: {message}");
                    }
                    if healing.healed {
                        test_code = healing.healed_code;
                        validation = adapter.validate(&test_code);
                        std::fs::write(&test_path, &test_code).map_err(|e| e.to_string())?;
                    }
                    if healing.is_flaky {
                        warn!("generated test is flaky; flagged for manual review");
                        if let Some(memory) = &self.memory {
                            let _ = memory.add_failed_pattern(
                                "flaky_test",
                                format!("E2E test for {target} is flaky"),
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("could not execute generated test: {e}"),
            }
        } else if validation.valid && !task.output_file.is_empty() {
            let test_path = self.project_root.join(&task.output_file);
            if let Some(parent) = test_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            std::fs::write(&test_path, &test_code).map_err(|e| e.to_string())?;
        }

        record_outcome(
            self.memory.as_deref(),
            validation.valid,
            "e2e_test",
            &framework,
            &language,
            &validation.errors.join("; "),
        );

        if !validation.valid {
            return Err(format!(
                "generated E2E test failed validation: {}",
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
impl Agent for E2eBuilder {
    fn name(&self) -> &str {
        "e2e-builder"
    }

    fn description(&self) -> &str {
        "Generate E2E tests for routes and user flows, with self-healing"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let build_task: E2eBuildTask = match serde_json::from_value(task.context.clone()) {
            Ok(parsed) => parsed,
            Err(e) => return TaskOutput::failed_with(format!("bad e2e build task: {e}")),
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

#[cfg(test)]
mod tests {
    use super::*;
    use nit_llm::{LlmError, LlmResponse};

    struct PlaywrightEngine;

    #[async_trait]
    impl LlmEngine for PlaywrightEngine {
        async fn generate(&self, request: GenerationRequest) -> Result<LlmResponse, LlmError> {
            // The prompt should carry the route and base URL through.
            let prompt: String = request.messages.iter().map(|m| m.content.clone()).collect();
            assert!(prompt.contains("/login"));
            assert!(prompt.contains("http://localhost:3000"));
            Ok(LlmResponse {
                text: "import { test, expect } from '@playwright/test';\n\ntest('login works', async ({ page }) => {\n  await page.goto('/login');\n});\n".into(),
                model: "pw".into(),
                prompt_tokens: 50,
                completion_tokens: 25,
            })
        }

        fn model_name(&self) -> &str {
            "pw"
        }
    }

    #[tokio::test]
    async fn generates_playwright_test_without_execution() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("playwright.config.ts"), "").unwrap();

        let builder = E2eBuilder::new(
            Arc::new(PlaywrightEngine),
            Arc::new(AdapterRegistry::new()),
            None,
            dir.path().to_path_buf(),
        )
        .with_config(BuilderConfig {
            enable_self_healing: false,
            ..Default::default()
        });

        let output = builder
            .run(TaskInput::new("build_e2e_test", "/login").with_context(json!({
                "route_path": "/login",
                "base_url": "http://localhost:3000",
            })))
            .await;

        assert!(output.is_completed(), "errors: {:?}", output.errors);
        assert!(output.result["test_code"]
            .as_str()
            .unwrap()
            .contains("@playwright/test"));
    }
}
