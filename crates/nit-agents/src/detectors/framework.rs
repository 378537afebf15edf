//! Framework detector: one project scan, many rules scored against it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use tracing::debug;
use walkdir::WalkDir;

use nit_core::{Agent, TaskInput, TaskOutput};

use super::is_skipped_dir;
use super::signals::{
    builtin_rules, DetectedFramework, DetectionThresholds, FrameworkCategory, FrameworkProfile,
    FrameworkRule, Signal,
};

/// Source-sample cap per file for import-pattern matching.
const SNIPPET_BYTES: usize = 8192;

/// Extensions collected as source snippets.
const SNIPPET_EXTENSIONS: [&str; 19] = [
    "py", "js", "ts", "jsx", "tsx", "mjs", "cjs", "cpp", "cc", "cxx", "h", "hpp", "hh", "hxx",
    "rs", "go", "java", "kt", "cs",
];

/// Everything signal matchers need, collected in a single walk.
struct ProjectFiles {
    file_names: Vec<String>,
    relative_paths: Vec<String>,
    package_json: serde_json::Value,
    pyproject_text: String,
    requirements_lines: Vec<String>,
    source_snippets: HashMap<String, String>,
}

fn scan_project(root: &Path) -> ProjectFiles {
    let mut pf = ProjectFiles {
        file_names: Vec::new(),
        relative_paths: Vec::new(),
        package_json: serde_json::Value::Null,
        pyproject_text: String::new(),
        requirements_lines: Vec::new(),
        source_snippets: HashMap::new(),
    };

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.file_name()
                .to_str()
                .map(|n| !is_skipped_dir(n))
                .unwrap_or(true)
        })
        .flatten()
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        let name = entry.file_name().to_string_lossy().into_owned();
        pf.relative_paths.push(rel.clone());
        pf.file_names.push(name.clone());

        let wants_snippet = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SNIPPET_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
            || name == "CMakeLists.txt";
        if wants_snippet {
            if let Ok(text) = std::fs::read_to_string(path) {
                let snippet: String = text.chars().take(SNIPPET_BYTES).collect();
                pf.source_snippets.insert(rel, snippet);
            }
        }
    }

    if let Ok(text) = std::fs::read_to_string(root.join("package.json")) {
        pf.package_json = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(text) = std::fs::read_to_string(root.join("pyproject.toml")) {
        pf.pyproject_text = text;
    }
    for req in ["requirements.txt", "requirements-dev.txt", "requirements_dev.txt"] {
        if let Ok(text) = std::fs::read_to_string(root.join(req)) {
            pf.requirements_lines.extend(text.lines().map(str::to_string));
        }
    }

    pf
}

// ── Signal matchers ─────────────────────────────────────────────────

fn match_signal(signal: &Signal, pf: &ProjectFiles) -> bool {
    match signal {
        Signal::ConfigFile { pattern, .. } => glob::Pattern::new(pattern)
            .map(|g| pf.file_names.iter().any(|n| g.matches(n)))
            .unwrap_or(false),
        Signal::Dependency { name, .. } => match_dependency(name, pf),
        Signal::ImportPattern { pattern, .. } => Regex::new(pattern)
            .map(|re| pf.source_snippets.values().any(|s| re.is_match(s)))
            .unwrap_or(false),
        Signal::FilePattern { glob, .. } => glob::Pattern::new(glob)
            .map(|g| pf.relative_paths.iter().any(|p| g.matches(p)))
            .unwrap_or(false),
        Signal::CMakePattern { pattern, .. } => {
            let Ok(re) = regex::RegexBuilder::new(pattern).case_insensitive(true).build() else {
                return pf
                    .source_snippets
                    .iter()
                    .filter(|(rel, _)| rel.ends_with("CMakeLists.txt"))
                    .any(|(_, s)| s.to_lowercase().contains(&pattern.to_lowercase()));
            };
            pf.source_snippets
                .iter()
                .filter(|(rel, _)| rel.ends_with("CMakeLists.txt"))
                .any(|(_, s)| re.is_match(s))
        }
        Signal::PackageJsonField {
            field_path,
            value_substring,
            ..
        } => match_package_json_field(field_path, value_substring, &pf.package_json),
    }
}

fn match_dependency(name: &str, pf: &ProjectFiles) -> bool {
    for section in ["devDependencies", "dependencies"] {
        if pf
            .package_json
            .get(section)
            .and_then(|d| d.as_object())
            .map(|d| d.contains_key(name))
            .unwrap_or(false)
        {
            return true;
        }
    }

    if !pf.pyproject_text.is_empty() {
        if let Ok(re) = Regex::new(&format!(r#"["']?{}["']?"#, regex::escape(name))) {
            if re.is_match(&pf.pyproject_text) {
                return true;
            }
        }
    }

    pf.requirements_lines.iter().any(|line| {
        let stripped = line.split('#').next().unwrap_or("").trim();
        let pkg = stripped
            .split(['<', '>', '=', '!', '~', ';', '['])
            .next()
            .unwrap_or("")
            .trim();
        pkg.eq_ignore_ascii_case(name)
    })
}

fn match_package_json_field(
    field_path: &str,
    value_substring: &str,
    package_json: &serde_json::Value,
) -> bool {
    let mut node = package_json;
    for part in field_path.split('.') {
        let Some(next) = node.get(part) else {
            return false;
        };
        node = next;
    }
    if value_substring.is_empty() {
        return true; // Key presence is enough.
    }
    node.as_str()
        .map(|s| s.contains(value_substring))
        .unwrap_or(false)
}

// ── Scoring ─────────────────────────────────────────────────────────

fn evaluate_rule(
    rule: &FrameworkRule,
    pf: &ProjectFiles,
    thresholds: &DetectionThresholds,
) -> Option<DetectedFramework> {
    let matched: Vec<&Signal> = rule.signals.iter().filter(|s| match_signal(s, pf)).collect();
    if matched.is_empty() {
        return None;
    }

    // Confidence = strongest matched signal plus a capped breadth bonus
    // per additional distinct signal type.
    let max_weight = matched.iter().map(|s| s.weight()).fold(0.0f64, f64::max);
    let distinct_types = matched
        .iter()
        .map(|s| s.kind())
        .collect::<std::collections::HashSet<_>>()
        .len();
    let breadth_bonus = (((distinct_types - 1) as f64) * thresholds.breadth_bonus_step)
        .min(thresholds.breadth_bonus_cap);
    let confidence = ((max_weight + breadth_bonus).min(1.0) * 10_000.0).round() / 10_000.0;

    Some(DetectedFramework {
        name: rule.name.to_string(),
        language: rule.language.to_string(),
        category: rule.category,
        confidence,
        matched_signals: matched.iter().map(|s| s.kind()).collect(),
    })
}

fn resolve_conflicts(frameworks: Vec<DetectedFramework>) -> Vec<DetectedFramework> {
    let mut best: HashMap<(String, FrameworkCategory), DetectedFramework> = HashMap::new();
    for fw in frameworks {
        let key = (fw.language.clone(), fw.category);
        match best.get(&key) {
            Some(existing) if existing.confidence >= fw.confidence => {}
            _ => {
                best.insert(key, fw);
            }
        }
    }
    let mut result: Vec<DetectedFramework> = best.into_values().collect();
    result.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    result
}

/// Scan `root` and score every rule. Deterministic: the same tree always
/// yields the same confidences.
pub fn detect_frameworks(
    root: &Path,
    rules: Option<Vec<FrameworkRule>>,
    thresholds: DetectionThresholds,
    resolve: bool,
) -> Result<FrameworkProfile, String> {
    if !root.is_dir() {
        return Err(format!("Not a directory: {}", root.display()));
    }

    let pf = scan_project(root);
    let rules = rules.unwrap_or_else(builtin_rules);

    let mut detected: Vec<DetectedFramework> = rules
        .iter()
        .filter_map(|rule| evaluate_rule(rule, &pf, &thresholds))
        .filter(|fw| fw.confidence >= thresholds.min_confidence)
        .collect();

    if resolve {
        detected = resolve_conflicts(detected);
    }
    debug!(count = detected.len(), "framework detection finished");

    Ok(FrameworkProfile {
        root: root.display().to_string(),
        frameworks: detected,
    })
}

/// Frameworks whose confidence falls below the LLM-fallback threshold.
/// The caller may disambiguate them with an LLM; this module never does.
pub fn needs_llm_fallback<'a>(
    profile: &'a FrameworkProfile,
    thresholds: &DetectionThresholds,
) -> Vec<&'a DetectedFramework> {
    profile
        .frameworks
        .iter()
        .filter(|f| f.confidence < thresholds.llm_fallback_threshold)
        .collect()
}

// ── Agent wrapper ───────────────────────────────────────────────────

/// Agent that detects test frameworks used in a project.
pub struct FrameworkDetector {
    thresholds: DetectionThresholds,
}

impl Default for FrameworkDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameworkDetector {
    pub fn new() -> Self {
        Self {
            thresholds: DetectionThresholds::default(),
        }
    }

    pub fn with_thresholds(thresholds: DetectionThresholds) -> Self {
        Self { thresholds }
    }
}

#[async_trait]
impl Agent for FrameworkDetector {
    fn name(&self) -> &str {
        "framework-detector"
    }

    fn description(&self) -> &str {
        "Identify test frameworks used in a project"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let root = PathBuf::from(&task.target);
        let resolve = task
            .context
            .get("resolve_conflicts")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        let profile = match detect_frameworks(&root, None, self.thresholds, resolve) {
            Ok(profile) => profile,
            Err(e) => return TaskOutput::failed_with(e),
        };
        let ambiguous: Vec<String> = needs_llm_fallback(&profile, &self.thresholds)
            .iter()
            .map(|f| f.name.clone())
            .collect();

        TaskOutput::completed(json!({
            "root": profile.root,
            "frameworks": profile
                .frameworks
                .iter()
                .map(|f| {
                    json!({
                        "name": f.name,
                        "language": f.language,
                        "category": serde_json::to_value(f.category).unwrap_or_default(),
                        "confidence": f.confidence,
                        "matched_signals": f.matched_signals,
                    })
                })
                .collect::<Vec<_>>(),
            "needs_llm_fallback": ambiguous,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vitest_project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"devDependencies":{"vitest":"^1.0.0"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("vitest.config.ts"), "").unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(
            src.join("math.test.ts"),
            "import { test, expect } from 'vitest';\ntest('adds', () => { expect(1+1).toBe(2); });\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn vitest_detected_with_high_confidence() {
        let dir = vitest_project();
        let profile = detect_frameworks(dir.path(), None, DetectionThresholds::default(), true)
            .unwrap();
        let vitest = profile
            .frameworks
            .iter()
            .find(|f| f.name == "vitest")
            .expect("vitest detected");
        assert_eq!(vitest.category, FrameworkCategory::UnitTest);
        assert!(vitest.confidence >= 0.8, "confidence {}", vitest.confidence);
    }

    #[test]
    fn scoring_is_deterministic() {
        let dir = vitest_project();
        let first = detect_frameworks(dir.path(), None, DetectionThresholds::default(), true)
            .unwrap();
        let second = detect_frameworks(dir.path(), None, DetectionThresholds::default(), true)
            .unwrap();
        let c1: Vec<f64> = first.frameworks.iter().map(|f| f.confidence).collect();
        let c2: Vec<f64> = second.frameworks.iter().map(|f| f.confidence).collect();
        assert_eq!(c1, c2);
    }

    #[test]
    fn conflict_resolution_keeps_best_per_language_category() {
        let dir = vitest_project();
        // A jest test file also exists, but vitest has stronger signals.
        std::fs::write(dir.path().join("app.test.js"), "test('x', () => {});\n").unwrap();
        let profile = detect_frameworks(dir.path(), None, DetectionThresholds::default(), true)
            .unwrap();
        let js_unit: Vec<&DetectedFramework> = profile
            .frameworks
            .iter()
            .filter(|f| f.language == "javascript" && f.category == FrameworkCategory::UnitTest)
            .collect();
        assert_eq!(js_unit.len(), 1);
        assert_eq!(js_unit[0].name, "vitest");
    }

    #[test]
    fn empty_project_detects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let profile = detect_frameworks(dir.path(), None, DetectionThresholds::default(), true)
            .unwrap();
        assert!(profile.frameworks.is_empty());
    }

    #[test]
    fn pytest_detected_from_conftest_and_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("conftest.py"), "").unwrap();
        let tests = dir.path().join("tests");
        std::fs::create_dir_all(&tests).unwrap();
        std::fs::write(tests.join("test_app.py"), "import pytest\n\ndef test_x():\n    assert True\n").unwrap();

        let profile = detect_frameworks(dir.path(), None, DetectionThresholds::default(), true)
            .unwrap();
        let pytest = profile.frameworks.iter().find(|f| f.name == "pytest").unwrap();
        assert!(pytest.confidence >= 0.8);
    }

    #[test]
    fn low_confidence_flagged_for_fallback() {
        let dir = tempfile::tempdir().unwrap();
        // Only a weak file-pattern signal for jest.
        std::fs::write(dir.path().join("app.test.js"), "test('x', () => {});\n").unwrap();
        let thresholds = DetectionThresholds::default();
        let profile = detect_frameworks(dir.path(), None, thresholds, true).unwrap();
        let ambiguous = needs_llm_fallback(&profile, &thresholds);
        assert!(ambiguous.iter().any(|f| f.name == "jest"));
    }

    #[tokio::test]
    async fn agent_wrapper_reports_profile() {
        let dir = vitest_project();
        let output = FrameworkDetector::new()
            .run(TaskInput::new("detect_frameworks", dir.path().display().to_string()))
            .await;
        assert!(output.is_completed());
        let frameworks = output.result["frameworks"].as_array().unwrap();
        assert!(frameworks.iter().any(|f| f["name"] == "vitest"));
    }

    #[tokio::test]
    async fn agent_wrapper_fails_on_missing_dir() {
        let output = FrameworkDetector::new()
            .run(TaskInput::new("detect_frameworks", "/definitely/not/a/dir"))
            .await;
        assert!(!output.is_completed());
    }
}
