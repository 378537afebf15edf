//! Drift watcher: runs drift tests, compares against stored baselines,
//! and suggests prompt adjustments when outputs drift.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use nit_core::state::drift_tests_path;
use nit_core::{Agent, DriftBaselineStore, TaskInput, TaskOutput};
use nit_llm::EmbeddingProvider;

use super::comparator::{ComparisonOutcome, ComparisonType, SemanticComparator};
use super::executor::{execute_test, parse_drift_tests, DriftTestSpec};

const CRITICAL_SIMILARITY: f64 = 0.5;
const MODERATE_SIMILARITY: f64 = 0.7;
const STABLE_SIMILARITY: f64 = 0.8;
const SIGNIFICANT_LENGTH_DIFF: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    Baseline,
    Test,
}

/// Result of one drift test.
#[derive(Debug, Clone, Serialize)]
pub struct DriftTestOutcome {
    pub test_id: String,
    pub test_name: String,
    pub passed: bool,
    pub skipped: bool,
    pub similarity_score: Option<f64>,
    pub error: Option<String>,
    pub baseline_exists: bool,
    pub prompt_optimization: Option<serde_json::Value>,
}

/// Aggregate report. `drift_detected` means at least one test FAILED —
/// skipped tests (no baseline, execution error) do not count as drift.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriftReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub drift_detected: bool,
    pub results: Vec<DriftTestOutcome>,
    pub executed_at: String,
}

/// Prompt-optimization suggestions for a drifted test.
pub fn optimization_suggestions(
    baseline_output: &str,
    current_output: &str,
    similarity_score: Option<f64>,
) -> serde_json::Value {
    let mut suggestions: Vec<String> = Vec::new();

    if let Some(score) = similarity_score {
        if score < CRITICAL_SIMILARITY {
            suggestions.push(
                "CRITICAL: very low similarity. Add explicit output format constraints \
                 (e.g. 'Return ONLY valid JSON' or 'Use exactly this format:')."
                    .into(),
            );
        } else if score < MODERATE_SIMILARITY {
            suggestions.push(
                "MODERATE: noticeable drift. Add few-shot examples demonstrating the exact \
                 expected output."
                    .into(),
            );
        }
    }

    let baseline_words = baseline_output.split_whitespace().count();
    let current_words = current_output.split_whitespace().count();
    let length_ratio =
        (baseline_words as f64 - current_words as f64).abs() / (baseline_words.max(1) as f64);
    if length_ratio > SIGNIFICANT_LENGTH_DIFF {
        suggestions.push(format!(
            "Output length changed significantly ({baseline_words} -> {current_words} words). \
             Add explicit length constraints."
        ));
    }

    let baseline_structured = baseline_output.contains('{') && baseline_output.contains('}');
    let current_structured = current_output.contains('{') && current_output.contains('}');
    if baseline_structured != current_structured {
        suggestions.push(
            "Output flipped between structured and unstructured. Add a JSON schema or explicit \
             format requirements."
                .into(),
        );
    }

    if matches!(similarity_score, Some(score) if score < STABLE_SIMILARITY) {
        suggestions
            .push("Consider lowering temperature (0.0-0.2) for more deterministic outputs.".into());
    }

    let severity = match similarity_score {
        Some(score) if score < CRITICAL_SIMILARITY => "critical",
        Some(score) if score < MODERATE_SIMILARITY => "moderate",
        Some(score) if score < STABLE_SIMILARITY => "minor",
        Some(_) => "minor",
        None => "unknown",
    };

    json!({
        "similarity_score": similarity_score,
        "drift_severity": severity,
        "suggestions": suggestions,
    })
}

pub struct DriftWatcher {
    project_root: PathBuf,
    baselines: DriftBaselineStore,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    enable_prompt_optimization: bool,
}

impl DriftWatcher {
    pub fn new(project_root: PathBuf) -> Self {
        let baselines = DriftBaselineStore::new(&project_root);
        Self {
            project_root,
            baselines,
            embedder: None,
            enable_prompt_optimization: true,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn without_prompt_optimization(mut self) -> Self {
        self.enable_prompt_optimization = false;
        self
    }

    fn load_specs(&self, tests_file: Option<&str>) -> Result<Vec<DriftTestSpec>, String> {
        let path = match tests_file {
            Some(file) => self.project_root.join(file),
            None => drift_tests_path(&self.project_root),
        };
        parse_drift_tests(&path)
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!("embedding failed: {e}");
                None
            }
        }
    }

    /// Baseline mode: execute every test and store its canonical output.
    pub async fn update_baselines(&self, tests_file: Option<&str>) -> Result<DriftReport, String> {
        let specs = self.load_specs(tests_file)?;
        let mut report = DriftReport {
            executed_at: Utc::now().to_rfc3339(),
            ..Default::default()
        };

        for spec in &specs {
            report.total += 1;
            match execute_test(spec, &self.project_root).await {
                Ok(output) => {
                    let embedding = if spec.comparison_type == ComparisonType::Semantic {
                        self.embed(&output).await
                    } else {
                        None
                    };
                    let metadata = HashMap::from([
                        ("test_name".to_string(), spec.name.clone()),
                        (
                            "comparison_type".to_string(),
                            format!("{:?}", spec.comparison_type).to_lowercase(),
                        ),
                    ]);
                    if let Err(e) =
                        self.baselines
                            .set_baseline(&spec.id, output.clone(), embedding, metadata)
                    {
                        report.skipped += 1;
                        report.results.push(DriftTestOutcome {
                            test_id: spec.id.clone(),
                            test_name: spec.name.clone(),
                            passed: false,
                            skipped: true,
                            similarity_score: None,
                            error: Some(e.to_string()),
                            baseline_exists: false,
                            prompt_optimization: None,
                        });
                        continue;
                    }
                    info!("updated baseline for drift test {}", spec.id);
                    report.passed += 1;
                    report.results.push(DriftTestOutcome {
                        test_id: spec.id.clone(),
                        test_name: spec.name.clone(),
                        passed: true,
                        skipped: false,
                        similarity_score: None,
                        error: None,
                        baseline_exists: true,
                        prompt_optimization: None,
                    });
                }
                Err(e) => {
                    report.skipped += 1;
                    report.results.push(DriftTestOutcome {
                        test_id: spec.id.clone(),
                        test_name: spec.name.clone(),
                        passed: false,
                        skipped: true,
                        similarity_score: None,
                        error: Some(e),
                        baseline_exists: false,
                        prompt_optimization: None,
                    });
                }
            }
        }
        Ok(report)
    }

    async fn compare(&self, spec: &DriftTestSpec, output: &str) -> DriftTestOutcome {
        let baseline = match self.baselines.get_baseline(&spec.id) {
            Ok(Some(baseline)) => baseline,
            Ok(None) => {
                warn!("no baseline for drift test {}, skipping comparison", spec.id);
                return DriftTestOutcome {
                    test_id: spec.id.clone(),
                    test_name: spec.name.clone(),
                    passed: false,
                    skipped: true,
                    similarity_score: None,
                    error: Some("no_baseline".into()),
                    baseline_exists: false,
                    prompt_optimization: None,
                };
            }
            Err(e) => {
                return DriftTestOutcome {
                    test_id: spec.id.clone(),
                    test_name: spec.name.clone(),
                    passed: false,
                    skipped: true,
                    similarity_score: None,
                    error: Some(e.to_string()),
                    baseline_exists: false,
                    prompt_optimization: None,
                }
            }
        };

        let outcome: ComparisonOutcome = match spec.comparison_type {
            ComparisonType::Exact => SemanticComparator::compare_exact(&baseline.output, output),
            ComparisonType::Regex => match spec.pattern() {
                Some(pattern) => SemanticComparator::compare_regex(pattern, output),
                None => SemanticComparator::compare_regex(&regex::escape(&baseline.output), output),
            },
            ComparisonType::Schema => match spec.schema() {
                Some(schema) => SemanticComparator::compare_schema(schema, output),
                None => ComparisonOutcome {
                    passed: false,
                    similarity_score: None,
                    error: Some("schema comparison requires comparison_config.schema".into()),
                },
            },
            ComparisonType::Semantic => {
                let baseline_embedding = baseline.embedding.clone().unwrap_or_default();
                let current_embedding = self.embed(output).await.unwrap_or_default();
                SemanticComparator::compare_semantic(
                    &baseline_embedding,
                    &current_embedding,
                    spec.threshold(),
                )
            }
        };

        // Execution succeeded: a comparator error marks the test failed,
        // not skipped.
        let prompt_optimization = if !outcome.passed && self.enable_prompt_optimization {
            Some(optimization_suggestions(
                &baseline.output,
                output,
                outcome.similarity_score,
            ))
        } else {
            None
        };

        DriftTestOutcome {
            test_id: spec.id.clone(),
            test_name: spec.name.clone(),
            passed: outcome.passed,
            skipped: false,
            similarity_score: outcome.similarity_score,
            error: outcome.error,
            baseline_exists: true,
            prompt_optimization,
        }
    }

    /// Test mode: execute every test and compare against its baseline.
    pub async fn run_drift_tests(&self, tests_file: Option<&str>) -> Result<DriftReport, String> {
        let specs = self.load_specs(tests_file)?;
        if specs.is_empty() {
            warn!("no drift tests found");
        }
        let mut report = DriftReport {
            executed_at: Utc::now().to_rfc3339(),
            ..Default::default()
        };

        for spec in &specs {
            report.total += 1;
            let outcome = match execute_test(spec, &self.project_root).await {
                Ok(output) => self.compare(spec, &output).await,
                Err(e) => DriftTestOutcome {
                    test_id: spec.id.clone(),
                    test_name: spec.name.clone(),
                    passed: false,
                    skipped: true,
                    similarity_score: None,
                    error: Some(e),
                    baseline_exists: false,
                    prompt_optimization: None,
                },
            };
            if outcome.skipped {
                report.skipped += 1;
            } else if outcome.passed {
                report.passed += 1;
            } else {
                report.failed += 1;
            }
            report.results.push(outcome);
        }

        report.drift_detected = report.failed > 0;
        Ok(report)
    }
}

#[async_trait]
impl Agent for DriftWatcher {
    fn name(&self) -> &str {
        "drift-watcher"
    }

    fn description(&self) -> &str {
        "Monitor LLM output drift against recorded baselines"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let mode = match task.context.get("mode").and_then(|v| v.as_str()) {
            Some("baseline") => WatchMode::Baseline,
            _ => WatchMode::Test,
        };
        let tests_file = task.context.get("tests_file").and_then(|v| v.as_str());

        let report = match mode {
            WatchMode::Baseline => self.update_baselines(tests_file).await,
            WatchMode::Test => self.run_drift_tests(tests_file).await,
        };

        match report {
            Ok(report) => TaskOutput::completed(json!({
                "total": report.total,
                "passed": report.passed,
                "failed": report.failed,
                "skipped": report.skipped,
                "drift_detected": report.drift_detected,
                "results": report.results,
                "executed_at": report.executed_at,
            })),
            Err(e) => TaskOutput::failed_with(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_drift_tests(dir: &std::path::Path, body: &str) {
        let nit = dir.join(".nit");
        std::fs::create_dir_all(&nit).unwrap();
        std::fs::write(nit.join("drift-tests.yml"), body).unwrap();
    }

    fn echo_test(id: &str, command: &str, comparison: &str, extra: &str) -> String {
        format!(
            concat!(
                "  - id: {id}\n",
                "    name: \"{id}\"\n",
                "    endpoint_type: cli\n",
                "    endpoint_config:\n",
                "      command: \"{command}\"\n",
                "    comparison_type: {comparison}\n",
                "{extra}"
            ),
            id = id,
            command = command,
            comparison = comparison,
            extra = extra,
        )
    }

    #[tokio::test]
    async fn baseline_then_test_no_drift() {
        let dir = tempfile::tempdir().unwrap();
        write_drift_tests(
            dir.path(),
            &format!("tests:\n{}", echo_test("greeting", "echo hello drift", "exact", "")),
        );

        let watcher = DriftWatcher::new(dir.path().to_path_buf());
        let baseline_report = watcher.update_baselines(None).await.unwrap();
        assert_eq!(baseline_report.passed, 1);

        let report = watcher.run_drift_tests(None).await.unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.passed, 1);
        assert!(!report.drift_detected);
    }

    #[tokio::test]
    async fn changed_output_detected_as_drift() {
        let dir = tempfile::tempdir().unwrap();
        // Baseline from one command, test with different output.
        write_drift_tests(
            dir.path(),
            &format!("tests:\n{}", echo_test("code", "echo 200", "exact", "")),
        );
        let watcher = DriftWatcher::new(dir.path().to_path_buf());
        watcher.update_baselines(None).await.unwrap();

        write_drift_tests(
            dir.path(),
            &format!("tests:\n{}", echo_test("code", "echo 100", "exact", "")),
        );
        let report = watcher.run_drift_tests(None).await.unwrap();
        assert_eq!(report.failed, 1);
        assert!(report.drift_detected);
        let outcome = &report.results[0];
        assert!(outcome.prompt_optimization.is_some());
    }

    #[tokio::test]
    async fn missing_baseline_is_skipped_not_drift() {
        let dir = tempfile::tempdir().unwrap();
        write_drift_tests(
            dir.path(),
            &format!("tests:\n{}", echo_test("fresh", "echo hi", "exact", "")),
        );
        let watcher = DriftWatcher::new(dir.path().to_path_buf());
        let report = watcher.run_drift_tests(None).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        assert!(!report.drift_detected);
        assert_eq!(report.results[0].error.as_deref(), Some("no_baseline"));
    }

    #[tokio::test]
    async fn regex_comparison_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        write_drift_tests(
            dir.path(),
            &format!(
                "tests:\n{}",
                echo_test(
                    "count",
                    "echo 42 items",
                    "regex",
                    "    comparison_config:\n      pattern: \"\\\\d+ items\"\n"
                )
            ),
        );
        let watcher = DriftWatcher::new(dir.path().to_path_buf());
        watcher.update_baselines(None).await.unwrap();
        let report = watcher.run_drift_tests(None).await.unwrap();
        assert_eq!(report.passed, 1);
        assert!(!report.drift_detected);
    }

    #[tokio::test]
    async fn execution_error_skips_test() {
        let dir = tempfile::tempdir().unwrap();
        write_drift_tests(
            dir.path(),
            &format!("tests:\n{}", echo_test("boom", "exit 7", "exact", "")),
        );
        let watcher = DriftWatcher::new(dir.path().to_path_buf());
        let report = watcher.run_drift_tests(None).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert!(!report.drift_detected);
    }

    #[tokio::test]
    async fn empty_tests_file_is_clean_report() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = DriftWatcher::new(dir.path().to_path_buf());
        let report = watcher.run_drift_tests(None).await.unwrap();
        assert_eq!(report.total, 0);
        assert!(!report.drift_detected);
    }

    #[test]
    fn severity_buckets() {
        let critical = optimization_suggestions("a b c", "x", Some(0.3));
        assert_eq!(critical["drift_severity"], "critical");
        let moderate = optimization_suggestions("a b c", "a b", Some(0.65));
        assert_eq!(moderate["drift_severity"], "moderate");
        let minor = optimization_suggestions("a b c", "a b c d", Some(0.75));
        assert_eq!(minor["drift_severity"], "minor");
        let unknown = optimization_suggestions("a", "b", None);
        assert_eq!(unknown["drift_severity"], "unknown");
    }

    #[test]
    fn length_and_format_suggestions() {
        let value = optimization_suggestions(
            "one two three four five six seven eight",
            "one",
            Some(0.75),
        );
        let suggestions = value["suggestions"].as_array().unwrap();
        assert!(suggestions
            .iter()
            .any(|s| s.as_str().unwrap().contains("length changed")));

        let value = optimization_suggestions("plain text", "{\"json\": true}", Some(0.75));
        let suggestions = value["suggestions"].as_array().unwrap();
        assert!(suggestions
            .iter()
            .any(|s| s.as_str().unwrap().contains("structured")));
    }
}
