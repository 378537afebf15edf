//! Semantic gap detector: LLM-powered discovery of missing test
//! scenarios beyond what coverage numbers show.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use nit_core::{Agent, TaskInput, TaskOutput};
use nit_llm::{GenerationRequest, LlmEngine, PromptTemplate};

use super::coverage::FunctionGap;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;
pub const MAX_FUNCTIONS_TO_ANALYZE: usize = 10;
pub const MIN_COMPLEXITY_FOR_ANALYSIS: u32 = 3;
pub const MAX_COVERAGE_FOR_ANALYSIS: f64 = 90.0;
const MAX_SNIPPET_CHARS: usize = 1000;

/// Categories of semantic gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapCategory {
    EdgeCase,
    ErrorPath,
    Integration,
    Behavioral,
    Concurrency,
    Security,
}

impl GapCategory {
    fn parse(text: &str) -> Self {
        match text.to_lowercase().as_str() {
            "error_path" => GapCategory::ErrorPath,
            "integration" => GapCategory::Integration,
            "behavioral" => GapCategory::Behavioral,
            "concurrency" => GapCategory::Concurrency,
            "security" => GapCategory::Security,
            _ => GapCategory::EdgeCase,
        }
    }
}

/// A missing test scenario identified by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticGap {
    pub category: GapCategory,
    pub description: String,
    pub function_name: String,
    pub file_path: String,
    pub severity: String,
    pub suggested_test_cases: Vec<String>,
    pub confidence: f64,
    pub reasoning: String,
}

/// Parse the sectioned LLM response (`---`-separated blocks with
/// `**FIELD**:` markers) into gaps.
pub fn parse_gap_response(response: &str, function_name: &str, file_path: &str) -> Vec<SemanticGap> {
    let field = |section: &str, name: &str| -> Option<String> {
        let re = Regex::new(&format!(
            r"(?is)\*\*{name}\*\*:\s*(.+?)(?:\*\*|\z)"
        ))
        .ok()?;
        re.captures(section).map(|c| c[1].trim().to_string())
    };

    response
        .split("---")
        .filter(|section| !section.trim().is_empty())
        .filter_map(|section| {
            let category = field(section, "CATEGORY")?;
            let description = field(section, "DESCRIPTION")?;
            let test_cases = field(section, "TEST_CASES")
                .map(|text| {
                    text.lines()
                        .map(str::trim)
                        .filter(|l| l.starts_with('-'))
                        .map(|l| l.trim_start_matches('-').trim().to_string())
                        .filter(|l| !l.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let confidence = field(section, "CONFIDENCE")
                .and_then(|c| c.split_whitespace().next().and_then(|v| v.parse().ok()))
                .unwrap_or(0.7);

            Some(SemanticGap {
                category: GapCategory::parse(category.split_whitespace().next().unwrap_or("")),
                description,
                function_name: function_name.to_string(),
                file_path: file_path.to_string(),
                severity: field(section, "SEVERITY")
                    .map(|s| s.split_whitespace().next().unwrap_or("medium").to_lowercase())
                    .unwrap_or_else(|| "medium".into()),
                suggested_test_cases: test_cases,
                confidence,
                reasoning: field(section, "REASONING").unwrap_or_default(),
            })
        })
        .collect()
}

fn control_flow_summary(code: &str) -> String {
    let count = |pattern: &str| Regex::new(pattern).map(|re| re.find_iter(code).count()).unwrap_or(0);
    let mut parts = Vec::new();
    let ifs = count(r"\bif\b");
    let loops = count(r"\b(for|while|loop)\b");
    let tries = count(r"\b(try|catch|except)\b");
    let returns = count(r"\breturn\b");
    if ifs > 0 {
        parts.push(format!("{ifs} conditional branches"));
    }
    if loops > 0 {
        parts.push(format!("{loops} loops"));
    }
    if tries > 0 {
        parts.push(format!("{tries} exception handlers"));
    }
    if returns > 0 {
        parts.push(format!("{returns} return statements"));
    }
    if parts.is_empty() {
        "simple function".into()
    } else {
        parts.join(", ")
    }
}

fn extract_function_snippet(source: &str, function_name: &str) -> String {
    for pattern in [
        format!(r"(?s)(def {function_name}\([^)]*\):.*?)(?:\ndef |\nclass |\z)"),
        format!(r"(?s)(function {function_name}\([^)]*\)\s*\{{.*?\}})"),
        format!(r"(?s)(fn {function_name}\([^)]*\).*?\{{.*?\}})"),
        format!(r"(?s)(func {function_name}\([^)]*\).*?\{{.*?\}})"),
    ] {
        if let Ok(re) = Regex::new(&pattern) {
            if let Some(caps) = re.captures(source) {
                return caps[1].chars().take(MAX_SNIPPET_CHARS).collect();
            }
        }
    }
    source.chars().take(MAX_SNIPPET_CHARS).collect()
}

/// The detector. Results are cached per (file, function) for the life of
/// the instance.
pub struct SemanticGapDetector {
    engine: Arc<dyn LlmEngine>,
    project_root: PathBuf,
    confidence_threshold: f64,
    max_functions: usize,
    cache: Mutex<HashMap<String, Vec<SemanticGap>>>,
}

impl SemanticGapDetector {
    pub fn new(engine: Arc<dyn LlmEngine>, project_root: PathBuf) -> Self {
        Self {
            engine,
            project_root,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_functions: MAX_FUNCTIONS_TO_ANALYZE,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_limits(mut self, confidence_threshold: f64, max_functions: usize) -> Self {
        self.confidence_threshold = confidence_threshold;
        self.max_functions = max_functions;
        self
    }

    async fn analyze_function(&self, gap: &FunctionGap) -> Vec<SemanticGap> {
        let source = std::fs::read_to_string(self.project_root.join(&gap.file_path))
            .unwrap_or_default();
        let snippet = extract_function_snippet(&source, &gap.function_name);
        let language = nit_parsing::detect_language(&gap.file_path).unwrap_or("unknown");

        let template = PromptTemplate::semantic_gap();
        let messages = match template.render(&json!({
            "function_name": gap.function_name,
            "file_path": gap.file_path,
            "language": language,
            "complexity": gap.complexity,
            "coverage_percentage": gap.coverage_percentage,
            "source_code": snippet,
            "ast_structure": control_flow_summary(&snippet),
        })) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("semantic gap prompt failed to render: {e}");
                return Vec::new();
            }
        };

        match self.engine.generate(GenerationRequest::from_messages(messages)).await {
            Ok(response) => parse_gap_response(&response.text, &gap.function_name, &gap.file_path),
            Err(e) => {
                warn!(
                    "semantic gap analysis failed for {} in {}: {e}",
                    gap.function_name, gap.file_path
                );
                Vec::new()
            }
        }
    }

    /// Analyze the prioritized gaps, skipping trivial or well-tested
    /// functions, capped by the configured budget.
    pub async fn detect(&self, function_gaps: &[FunctionGap]) -> Vec<SemanticGap> {
        let mut results = Vec::new();

        for gap in function_gaps.iter().take(self.max_functions) {
            if gap.complexity < MIN_COMPLEXITY_FOR_ANALYSIS {
                continue;
            }
            if gap.coverage_percentage > MAX_COVERAGE_FOR_ANALYSIS {
                continue;
            }

            let cache_key = format!("{}:{}", gap.file_path, gap.function_name);
            {
                let cache = self.cache.lock().await;
                if let Some(cached) = cache.get(&cache_key) {
                    results.extend(cached.clone());
                    continue;
                }
            }

            let found = self.analyze_function(gap).await;
            let high_confidence: Vec<SemanticGap> = found
                .into_iter()
                .filter(|g| g.confidence >= self.confidence_threshold)
                .collect();

            self.cache
                .lock()
                .await
                .insert(cache_key, high_confidence.clone());
            results.extend(high_confidence);
        }

        info!(gaps = results.len(), "semantic gap detection complete");
        results
    }
}

#[async_trait]
impl Agent for SemanticGapDetector {
    fn name(&self) -> &str {
        "semantic-gap-detector"
    }

    fn description(&self) -> &str {
        "Identify missing test scenarios with LLM analysis"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let gaps: Vec<FunctionGap> = match task
            .context
            .get("function_gaps")
            .cloned()
            .map(serde_json::from_value)
        {
            Some(Ok(gaps)) => gaps,
            Some(Err(e)) => return TaskOutput::failed_with(format!("bad function_gaps: {e}")),
            None => Vec::new(),
        };

        if gaps.is_empty() {
            return TaskOutput::completed(json!({ "semantic_gaps": [] }));
        }

        let semantic_gaps = self.detect(&gaps).await;
        TaskOutput::completed(json!({
            "semantic_gaps": semantic_gaps,
            "functions_analyzed": gaps.len().min(self.max_functions),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::coverage::GapPriority;
    use nit_llm::{LlmError, LlmResponse};

    struct CannedEngine {
        response: String,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl LlmEngine for CannedEngine {
        async fn generate(&self, _request: GenerationRequest) -> Result<LlmResponse, LlmError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(LlmResponse {
                text: self.response.clone(),
                model: "canned".into(),
                prompt_tokens: 10,
                completion_tokens: 20,
            })
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    const GAP_RESPONSE: &str = "\
**CATEGORY**: error_path
**SEVERITY**: high
**DESCRIPTION**: Division by zero is never exercised
**TEST_CASES**:
- divide(1, 0) raises the documented error
- divide(0, 0) raises the documented error
**CONFIDENCE**: 0.9
**REASONING**: The denominator is user-controlled.
---
**CATEGORY**: edge_case
**SEVERITY**: low
**DESCRIPTION**: Negative inputs untested
**TEST_CASES**:
- divide(-4, 2) returns -2
**CONFIDENCE**: 0.4
**REASONING**: Sign handling is implicit.
";

    fn sample_gap(complexity: u32, coverage: f64) -> FunctionGap {
        FunctionGap {
            function_name: "divide".into(),
            file_path: "src/calc.py".into(),
            priority: GapPriority::High,
            complexity,
            coverage_percentage: coverage,
        }
    }

    #[test]
    fn response_sections_parsed() {
        let gaps = parse_gap_response(GAP_RESPONSE, "divide", "src/calc.py");
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].category, GapCategory::ErrorPath);
        assert_eq!(gaps[0].severity, "high");
        assert_eq!(gaps[0].suggested_test_cases.len(), 2);
        assert!((gaps[0].confidence - 0.9).abs() < 1e-9);
        assert!(gaps[0].reasoning.contains("denominator"));
        assert_eq!(gaps[1].category, GapCategory::EdgeCase);
    }

    #[test]
    fn malformed_sections_skipped() {
        let gaps = parse_gap_response("no markers here\n---\n**SEVERITY**: high\n", "f", "a.py");
        assert!(gaps.is_empty());
    }

    #[tokio::test]
    async fn low_confidence_gaps_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(CannedEngine {
            response: GAP_RESPONSE.into(),
            calls: Default::default(),
        });
        let detector = SemanticGapDetector::new(engine.clone(), dir.path().to_path_buf());
        let gaps = detector.detect(&[sample_gap(5, 40.0)]).await;
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].category, GapCategory::ErrorPath);
    }

    #[tokio::test]
    async fn trivial_and_well_tested_functions_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(CannedEngine {
            response: GAP_RESPONSE.into(),
            calls: Default::default(),
        });
        let detector = SemanticGapDetector::new(engine.clone(), dir.path().to_path_buf());
        let gaps = detector
            .detect(&[sample_gap(1, 40.0), sample_gap(8, 95.0)])
            .await;
        assert!(gaps.is_empty());
        assert_eq!(engine.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn results_cached_per_function() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(CannedEngine {
            response: GAP_RESPONSE.into(),
            calls: Default::default(),
        });
        let detector = SemanticGapDetector::new(engine.clone(), dir.path().to_path_buf());
        detector.detect(&[sample_gap(5, 40.0)]).await;
        detector.detect(&[sample_gap(5, 40.0)]).await;
        assert_eq!(engine.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
