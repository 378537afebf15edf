//! The orchestrator: composes agents per command.
//!
//! A `RunContext` arena owns the engine, memory, adapter registry, and
//! concurrency limiter for the duration of a run; agents borrow it.
//! Independent detectors run concurrently; builders fan out under a
//! global cap. Errors inside agents never escape their `TaskOutput` —
//! the orchestrator decides per command what is fatal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use walkdir::WalkDir;

use nit_adapters::AdapterRegistry;
use nit_config::NitConfig;
use nit_core::{Agent, CancelToken, GlobalMemory, TaskInput, TaskOutput};
use nit_llm::LlmEngine;
use nit_parsing::detect_language;

use crate::analyzers::diff::is_test_file;
use crate::analyzers::{PatternAnalyzer, SecurityAnalyzer};
use crate::builders::UnitBuilder;
use crate::debuggers::{restore_pending_fixes, FixGenerator, FixVerifier, RootCauseAnalyzer};
use crate::debuggers::bug_detect::BugReport;
use crate::detectors::{
    DependencyDetector, FrameworkDetector, InfraDetector, StackDetector,
};
use crate::reporters::SlackReporter;
use crate::watchers::DriftWatcher;

const DEFAULT_MAX_CONCURRENCY: usize = 4;
const DEFAULT_MAX_TARGETS: usize = 10;

/// Everything a run shares, owned here for the run's duration.
pub struct RunContext {
    pub config: NitConfig,
    pub engine: Arc<dyn LlmEngine>,
    pub memory: Arc<GlobalMemory>,
    pub registry: Arc<AdapterRegistry>,
    pub cancel: CancelToken,
    pub limiter: Arc<tokio::sync::Semaphore>,
    pub deadline: Option<Instant>,
    pub project_root: PathBuf,
}

impl RunContext {
    pub fn new(
        config: NitConfig,
        engine: Arc<dyn LlmEngine>,
    ) -> Result<Self, nit_core::MemoryError> {
        let project_root = PathBuf::from(&config.project.root);
        let memory = Arc::new(GlobalMemory::open(&project_root)?);
        Ok(Self {
            config,
            engine,
            memory,
            registry: Arc::new(AdapterRegistry::new()),
            cancel: CancelToken::new(),
            limiter: Arc::new(tokio::sync::Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
            deadline: None,
            project_root,
        })
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.deadline = Some(Instant::now() + budget);
        self
    }

    pub fn with_concurrency(mut self, cap: usize) -> Self {
        self.limiter = Arc::new(tokio::sync::Semaphore::new(cap.max(1)));
        self
    }

    fn out_of_time(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }
}

/// Typed summary handed to reporters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub command: String,
    pub targets: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub tests_generated: usize,
    pub tokens_used: u64,
    #[serde(default)]
    pub generated_files: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

pub struct Orchestrator {
    context: RunContext,
}

impl Orchestrator {
    pub fn new(context: RunContext) -> Self {
        // Heal any interrupted fix verification before doing anything.
        if restore_pending_fixes(&context.project_root) {
            warn!("restored source files from an interrupted fix verification");
        }
        Self { context }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    fn cancelled_output() -> TaskOutput {
        TaskOutput::failed(vec!["cancelled".into()])
    }

    /// Run the detector battery concurrently and merge results.
    pub async fn detect(&self) -> TaskOutput {
        if self.context.cancel.is_cancelled() {
            return Self::cancelled_output();
        }
        let root = self.context.project_root.display().to_string();

        let framework_detector = FrameworkDetector::new();
        let (stack, frameworks, dependencies, infra) = tokio::join!(
            StackDetector.run(TaskInput::new("detect_stack", &root)),
            framework_detector.run(TaskInput::new("detect_frameworks", &root)),
            DependencyDetector.run(TaskInput::new("detect_dependencies", &root)),
            InfraDetector.run(TaskInput::new("detect_infra", &root)),
        );

        let mut errors: Vec<String> = Vec::new();
        for output in [&stack, &frameworks, &dependencies, &infra] {
            errors.extend(output.errors.iter().cloned());
        }

        let output = TaskOutput::completed(json!({
            "stack": stack.result,
            "frameworks": frameworks.result,
            "dependencies": dependencies.result,
            "infra": infra.result,
        }));
        if errors.is_empty() {
            output
        } else {
            TaskOutput {
                errors,
                ..output
            }
        }
    }

    fn pick_framework(&self, detection: &serde_json::Value) -> Option<String> {
        let pinned = &self.context.config.testing.unit_framework;
        if !pinned.is_empty() {
            return Some(pinned.clone());
        }
        detection["frameworks"]["frameworks"]
            .as_array()
            .and_then(|frameworks| {
                frameworks
                    .iter()
                    .find(|f| f["category"] == "unit_test")
                    .and_then(|f| f["name"].as_str())
                    .map(str::to_string)
            })
    }

    fn collect_targets(&self, language: &str, max_targets: usize) -> Vec<String> {
        let mut targets = Vec::new();
        for entry in WalkDir::new(&self.context.project_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.file_name()
                    .to_str()
                    .map(|n| !crate::detectors::is_skipped_dir(n) && n != "tests")
                    .unwrap_or(true)
            })
            .flatten()
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if detect_language(path) != Some(language) {
                continue;
            }
            let rel = path
                .strip_prefix(&self.context.project_root)
                .unwrap_or(path)
                .display()
                .to_string();
            if is_test_file(&rel) || rel.ends_with("__init__.py") || rel.ends_with("conftest.py") {
                continue;
            }
            targets.push(rel);
            if targets.len() >= max_targets {
                break;
            }
        }
        targets
    }

    fn output_file_for(language: &str, source: &str) -> String {
        let path = Path::new(source);
        let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        match language {
            "python" => format!("tests/test_{stem}.py"),
            "typescript" | "tsx" => format!("tests/{stem}.test.ts"),
            "javascript" => format!("tests/{stem}.test.js"),
            "go" => {
                let parent = path.parent().map(|p| p.display().to_string()).unwrap_or_default();
                if parent.is_empty() {
                    format!("{stem}_test.go")
                } else {
                    format!("{parent}/{stem}_test.go")
                }
            }
            _ => format!("tests/{stem}_test.txt"),
        }
    }

    /// The generate command: detect → analyze patterns → fan out unit
    /// builders → summarize → report.
    pub async fn generate(&self, max_targets: Option<usize>) -> (RunSummary, TaskOutput) {
        let started = Instant::now();
        let mut summary = RunSummary {
            command: "generate".into(),
            ..Default::default()
        };

        if self.context.cancel.is_cancelled() {
            summary.errors.push("cancelled".into());
            return (summary, Self::cancelled_output());
        }

        // Detection failures are fatal for generate.
        let detection = self.detect().await;
        if !detection.errors.is_empty() {
            summary.errors.extend(detection.errors.iter().cloned());
            return (
                summary,
                TaskOutput::failed(detection.errors),
            );
        }

        let language = {
            let configured = &self.context.config.project.primary_language;
            if configured.is_empty() {
                detection.result["stack"]["primary_language"]
                    .as_str()
                    .unwrap_or("")
                    .to_string()
            } else {
                configured.clone()
            }
        };
        let Some(framework) = self.pick_framework(&detection.result) else {
            let message = "no test framework detected; run bootstrap or pin testing.unit_framework";
            summary.errors.push(message.into());
            return (summary, TaskOutput::failed_with(message));
        };
        info!(language, framework, "generation targets resolved");

        // Convention analysis seeds memory before builders run.
        let pattern_analyzer = PatternAnalyzer::new(Some(self.context.memory.clone()));
        let _ = pattern_analyzer
            .run(
                TaskInput::new("analyze_patterns", self.context.project_root.display().to_string())
                    .with_context(json!({ "language": language })),
            )
            .await;

        let targets = self.collect_targets(&language, max_targets.unwrap_or(DEFAULT_MAX_TARGETS));
        summary.targets = targets.len();

        let builder = Arc::new(UnitBuilder::new(
            self.context.engine.clone(),
            self.context.registry.clone(),
            Some(self.context.memory.clone()),
            self.context.project_root.clone(),
        ));

        let mut handles = Vec::new();
        for target in targets {
            if self.context.cancel.is_cancelled() || self.context.out_of_time() {
                summary.errors.push(format!("{target}: skipped (run budget exhausted)"));
                continue;
            }
            let builder = builder.clone();
            let limiter = self.context.limiter.clone();
            let cancel = self.context.cancel.clone();
            let framework = framework.clone();
            let output_file = Self::output_file_for(&language, &target);
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire_owned().await;
                if cancel.is_cancelled() {
                    return (target, Self::cancelled_output());
                }
                let output = builder
                    .run(TaskInput::new("build_unit_test", &target).with_context(json!({
                        "source_file": target,
                        "framework": framework,
                        "output_file": output_file,
                    })))
                    .await;
                (target, output)
            }));
        }

        for handle in handles {
            let Ok((target, output)) = handle.await else {
                summary.failed += 1;
                summary.errors.push("builder task panicked".into());
                continue;
            };
            if output.is_completed() {
                summary.succeeded += 1;
                summary.tests_generated += 1;
                summary.tokens_used += output.result["tokens_used"].as_u64().unwrap_or(0);
                if let Some(file) = output.result["output_file"].as_str() {
                    if !file.is_empty() {
                        summary.generated_files.push(file.to_string());
                    }
                }
            } else {
                // One builder failing among many is not fatal.
                summary.failed += 1;
                summary
                    .errors
                    .push(format!("{target}: {}", output.errors.join("; ")));
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;

        if !self.context.config.report.slack_webhook.is_empty() {
            SlackReporter::new(&self.context.config.report.slack_webhook)
                .report(&summary)
                .await;
        }

        let output = TaskOutput::completed(json!({ "summary": &summary }));
        (summary, output)
    }

    /// The verify-fix command: bug → root cause → fix → verification.
    pub async fn verify_fix(&self, bug: BugReport, reproduction_test: &str) -> TaskOutput {
        if self.context.cancel.is_cancelled() {
            return Self::cancelled_output();
        }

        let analyzer =
            RootCauseAnalyzer::new(self.context.engine.clone(), self.context.project_root.clone());
        let cause = match analyzer.analyze(&bug).await {
            Ok(cause) => cause,
            Err(e) => return TaskOutput::failed_with(format!("root-cause analysis failed: {e}")),
        };

        let generator =
            FixGenerator::new(self.context.engine.clone(), self.context.project_root.clone());
        let fix = match generator.generate_fix(&bug.suspect_file, &cause).await {
            Ok(fix) => fix,
            Err(e) => return TaskOutput::failed_with(format!("fix generation failed: {e}")),
        };

        let detected = self.context.registry.detect_test_adapters(&self.context.project_root);
        let Some(adapter) = detected.into_iter().next() else {
            return TaskOutput::failed_with("no test adapter detected for verification");
        };

        let verifier = FixVerifier::new(self.context.project_root.clone(), adapter);
        match verifier.verify(&fix, reproduction_test).await {
            Ok(report) => {
                let is_verified = report.is_verified;
                TaskOutput::completed(json!({
                    "root_cause": cause,
                    "fix": fix,
                    "verification": report,
                    "is_verified": is_verified,
                }))
            }
            Err(e) => TaskOutput::failed_with(e),
        }
    }

    /// The drift command.
    pub async fn drift(&self, baseline_mode: bool) -> TaskOutput {
        if self.context.cancel.is_cancelled() {
            return Self::cancelled_output();
        }
        let watcher = DriftWatcher::new(self.context.project_root.clone());
        watcher
            .run(
                TaskInput::new("drift", self.context.project_root.display().to_string())
                    .with_context(json!({
                        "mode": if baseline_mode { "baseline" } else { "test" },
                    })),
            )
            .await
    }

    /// The audit command.
    pub async fn audit(&self) -> TaskOutput {
        if self.context.cancel.is_cancelled() {
            return Self::cancelled_output();
        }
        SecurityAnalyzer::with_engine(self.context.engine.clone())
            .run(TaskInput::new(
                "audit",
                self.context.project_root.display().to_string(),
            ))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nit_llm::{GenerationRequest, LlmError, LlmResponse};

    struct TestEngine;

    #[async_trait]
    impl LlmEngine for TestEngine {
        async fn generate(&self, _request: GenerationRequest) -> Result<LlmResponse, LlmError> {
            Ok(LlmResponse {
                text: "def test_generated():\n    assert True\n".into(),
                model: "test-engine".into(),
                prompt_tokens: 100,
                completion_tokens: 30,
            })
        }

        fn model_name(&self) -> &str {
            "test-engine"
        }
    }

    fn python_project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("conftest.py"), "").unwrap();
        std::fs::write(dir.path().join("pyproject.toml"), "[project]\nname = \"app\"\n").unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("calc.py"), "def add(a, b):\n    return a + b\n").unwrap();
        std::fs::write(src.join("text.py"), "def shout(s):\n    return s.upper()\n").unwrap();
        dir
    }

    fn context_for(dir: &tempfile::TempDir) -> RunContext {
        let mut config = nit_config::load_config(dir.path()).unwrap();
        config.project.root = dir.path().display().to_string();
        RunContext::new(config, Arc::new(TestEngine)).unwrap()
    }

    #[tokio::test]
    async fn generate_builds_tests_for_every_target() {
        let dir = python_project();
        let orchestrator = Orchestrator::new(context_for(&dir));
        let (summary, output) = orchestrator.generate(Some(5)).await;

        assert!(output.is_completed(), "errors: {:?}", summary.errors);
        assert_eq!(summary.targets, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.generated_files.len(), 2);
        for file in &summary.generated_files {
            assert!(dir.path().join(file).is_file());
        }
        // Memory accumulated the outcomes.
        assert_eq!(orchestrator.context().memory.stats().successful, 2);
    }

    #[tokio::test]
    async fn generate_without_framework_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.zig"), "// not supported\n").unwrap();
        let orchestrator = Orchestrator::new(context_for_empty(&dir));
        let (summary, output) = orchestrator.generate(None).await;
        assert!(!output.is_completed());
        assert!(summary.errors.iter().any(|e| e.contains("no test framework")));
    }

    fn context_for_empty(dir: &tempfile::TempDir) -> RunContext {
        let mut config = nit_config::load_config(dir.path()).unwrap();
        config.project.root = dir.path().display().to_string();
        RunContext::new(config, Arc::new(TestEngine)).unwrap()
    }

    #[tokio::test]
    async fn cancelled_run_does_no_work() {
        let dir = python_project();
        let context = context_for(&dir);
        context.cancel.cancel();
        let orchestrator = Orchestrator::new(context);
        let (summary, output) = orchestrator.generate(None).await;
        assert!(!output.is_completed());
        assert_eq!(summary.succeeded, 0);
        assert!(summary.errors.contains(&"cancelled".to_string()));
    }

    #[tokio::test]
    async fn detect_merges_all_detectors() {
        let dir = python_project();
        let orchestrator = Orchestrator::new(context_for(&dir));
        let output = orchestrator.detect().await;
        assert!(output.is_completed());
        assert_eq!(output.result["stack"]["primary_language"], "python");
        assert!(output.result["frameworks"]["frameworks"]
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f["name"] == "pytest"));
    }

    #[tokio::test]
    async fn audit_command_reports_findings() {
        let dir = python_project();
        std::fs::write(
            dir.path().join("src").join("danger.py"),
            "import os\n\ndef run(cmd):\n    os.system(cmd)\n",
        )
        .unwrap();
        let orchestrator = Orchestrator::new(context_for(&dir));
        let output = orchestrator.audit().await;
        assert!(output.is_completed());
        assert!(!output.result["findings"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn drift_command_round_trips() {
        let dir = python_project();
        let nit = dir.path().join(".nit");
        std::fs::create_dir_all(&nit).unwrap();
        std::fs::write(
            nit.join("drift-tests.yml"),
            concat!(
                "tests:\n",
                "  - id: greeting\n",
                "    name: \"greeting\"\n",
                "    endpoint_type: cli\n",
                "    endpoint_config:\n",
                "      command: \"echo hello drift\"\n",
                "    comparison_type: exact\n",
            ),
        )
        .unwrap();

        let orchestrator = Orchestrator::new(context_for(&dir));
        let baseline = orchestrator.drift(true).await;
        assert!(baseline.is_completed());
        let test = orchestrator.drift(false).await;
        assert!(test.is_completed());
        assert_eq!(test.result["drift_detected"], false);
        assert_eq!(test.result["passed"], 1);
    }
}
