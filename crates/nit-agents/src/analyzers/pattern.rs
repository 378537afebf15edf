//! Pattern analyzer: aggregates test conventions across the project and
//! seeds them into memory so later runs reuse the project's idioms.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use nit_core::{Agent, GlobalMemory, TaskInput, TaskOutput};
use nit_llm::context::{extract_test_patterns, find_any_test_files, DetectedTestPattern};
use nit_parsing::detect_language;

const DEFAULT_MAX_FILES: usize = 50;

/// Aggregated conventions across the analyzed test files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConventionProfile {
    pub language: String,
    pub naming_style: String,
    pub assertion_style: String,
    pub mocking_patterns: Vec<String>,
    pub common_imports: Vec<String>,
    pub sample_test: String,
    pub files_analyzed: usize,
}

impl ConventionProfile {
    pub fn to_test_pattern(&self) -> DetectedTestPattern {
        DetectedTestPattern {
            naming_style: self.naming_style.clone(),
            assertion_style: self.assertion_style.clone(),
            mocking_patterns: self.mocking_patterns.clone(),
            imports: self.common_imports.iter().take(5).cloned().collect(),
            sample_test: self.sample_test.clone(),
        }
    }
}

/// Analyze the project's existing test files for conventions.
pub fn analyze_patterns(
    root: &std::path::Path,
    language: Option<&str>,
    max_files: usize,
) -> ConventionProfile {
    let languages: Vec<&str> = match language {
        Some(lang) => vec![lang],
        None => vec!["python", "typescript", "javascript", "go", "java", "cpp"],
    };

    let mut files = Vec::new();
    for lang in &languages {
        files.extend(find_any_test_files(root, lang, max_files - files.len()));
        if files.len() >= max_files {
            break;
        }
    }
    files.truncate(max_files);

    if files.is_empty() {
        return ConventionProfile {
            language: language.unwrap_or("unknown").to_string(),
            naming_style: "unknown".into(),
            assertion_style: "unknown".into(),
            ..Default::default()
        };
    }

    let detected_language = language
        .map(str::to_string)
        .or_else(|| files.first().and_then(|f| detect_language(f)).map(str::to_string))
        .unwrap_or_else(|| "unknown".into());

    let pattern = extract_test_patterns(&files, &detected_language);
    ConventionProfile {
        language: detected_language,
        naming_style: pattern.naming_style,
        assertion_style: pattern.assertion_style,
        mocking_patterns: pattern.mocking_patterns,
        common_imports: pattern.imports,
        sample_test: pattern.sample_test,
        files_analyzed: files.len(),
    }
}

/// Persist the profile into memory: the conventions map plus one known
/// pattern per detected style.
pub fn seed_memory(memory: &GlobalMemory, profile: &ConventionProfile) {
    let conventions: HashMap<String, serde_json::Value> = HashMap::from([
        ("language".into(), json!(profile.language)),
        ("naming_style".into(), json!(profile.naming_style)),
        ("assertion_style".into(), json!(profile.assertion_style)),
        ("mocking_patterns".into(), json!(profile.mocking_patterns)),
        ("common_imports".into(), json!(profile.common_imports)),
        ("files_analyzed".into(), json!(profile.files_analyzed)),
    ]);
    if let Err(e) = memory.set_conventions(conventions) {
        warn!("failed to store conventions: {e}");
        return;
    }

    let context = HashMap::from([("language".to_string(), json!(profile.language))]);
    let mut patterns = Vec::new();
    if profile.naming_style != "unknown" {
        patterns.push(format!("naming_style:{}", profile.naming_style));
    }
    if profile.assertion_style != "unknown" {
        patterns.push(format!("assertion_style:{}", profile.assertion_style));
    }
    for mock in &profile.mocking_patterns {
        patterns.push(format!("mocking_pattern:{mock}"));
    }
    for pattern in patterns {
        if let Err(e) = memory.add_known_pattern(pattern, context.clone()) {
            warn!("failed to store known pattern: {e}");
        }
    }
}

/// Agent wrapper. With memory enabled, the profile is seeded into
/// `.nit/memory.json`.
pub struct PatternAnalyzer {
    memory: Option<Arc<GlobalMemory>>,
    max_files: usize,
}

impl PatternAnalyzer {
    pub fn new(memory: Option<Arc<GlobalMemory>>) -> Self {
        Self {
            memory,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

#[async_trait]
impl Agent for PatternAnalyzer {
    fn name(&self) -> &str {
        "pattern-analyzer"
    }

    fn description(&self) -> &str {
        "Extract naming, assertion, and mocking conventions from existing tests"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let root = PathBuf::from(&task.target);
        if !root.exists() {
            return TaskOutput::failed_with(format!("Project root does not exist: {}", root.display()));
        }
        let language = task.context.get("language").and_then(|v| v.as_str());

        let profile = analyze_patterns(&root, language, self.max_files);
        info!(
            naming = %profile.naming_style,
            assertion = %profile.assertion_style,
            files = profile.files_analyzed,
            "pattern analysis complete"
        );

        if let Some(memory) = &self.memory {
            if profile.files_analyzed > 0 {
                seed_memory(memory, &profile);
            }
        }

        TaskOutput::completed(json!({ "profile": profile }))
    }
}
