//! Self-healing for failing browser tests.
//!
//! Selector failures are healed by regenerating the test against a DOM
//! snapshot; timeouts trigger a flakiness probe first, and flaky tests
//! are reported rather than healed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use nit_adapters::{CaseStatus, RunResult, TestAdapter};
use nit_llm::{GenerationRequest, LlmEngine, PromptTemplate};

/// How a failing test is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    SelectorNotFound,
    Timeout,
    ElementNotVisible,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureClassification {
    pub failure_type: FailureType,
    pub confidence: f64,
    /// The offending selector, when one could be extracted.
    pub selector: String,
}

/// A snapshot of the page the test runs against.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DomSnapshot {
    pub test_ids: Vec<String>,
    pub roles: Vec<String>,
    pub text_content: Vec<String>,
    pub selectors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HealingResult {
    pub healed: bool,
    pub healed_code: String,
    pub is_flaky: bool,
    pub failure_classification: Option<FailureClassification>,
    pub messages: Vec<String>,
}

struct ClassifierRegexes {
    selector_not_found: Vec<Regex>,
    timeout: Vec<Regex>,
    not_visible: Vec<Regex>,
    selector_extractors: Vec<Regex>,
}

fn classifier_regexes() -> &'static ClassifierRegexes {
    static REGEXES: OnceLock<ClassifierRegexes> = OnceLock::new();
    REGEXES.get_or_init(|| ClassifierRegexes {
        selector_not_found: vec![
            Regex::new(r"(?i)selector .* not found").unwrap(),
            Regex::new(r"(?i)no element matches").unwrap(),
            Regex::new(r"(?i)locator\([^)]*\).*(not found|resolved to 0)").unwrap(),
            Regex::new(r"(?i)getByTestId\([^)]*\).*not found").unwrap(),
            Regex::new(r"(?i)waiting for (locator|selector)").unwrap(),
        ],
        timeout: vec![
            Regex::new(r"(?i)timeout \d+m?s exceeded").unwrap(),
            Regex::new(r"(?i)timed? ?out").unwrap(),
        ],
        not_visible: vec![
            Regex::new(r"(?i)element is not visible").unwrap(),
            Regex::new(r"(?i)element is outside of the viewport").unwrap(),
        ],
        selector_extractors: vec![
            Regex::new(r#"locator\(['"]([^'"]+)['"]\)"#).unwrap(),
            Regex::new(r#"getByTestId\(['"]([^'"]+)['"]\)"#).unwrap(),
            Regex::new(r#"selector ['"]([^'"]+)['"]"#).unwrap(),
            Regex::new(r#"waiting for selector ['"]([^'"]+)['"]"#).unwrap(),
            Regex::new(r"(#[\w-]+)").unwrap(),
        ],
    })
}

/// Extract the selector a failure message complains about.
pub fn extract_selector(error_text: &str) -> String {
    for re in &classifier_regexes().selector_extractors {
        if let Some(caps) = re.captures(error_text) {
            return caps[1].to_string();
        }
    }
    String::new()
}

/// Classify a failure message.
pub fn classify_failure(error_text: &str) -> FailureClassification {
    let regexes = classifier_regexes();

    if regexes.selector_not_found.iter().any(|re| re.is_match(error_text)) {
        return FailureClassification {
            failure_type: FailureType::SelectorNotFound,
            confidence: 0.9,
            selector: extract_selector(error_text),
        };
    }
    if regexes.not_visible.iter().any(|re| re.is_match(error_text)) {
        // Visibility failures heal the same way selector failures do.
        return FailureClassification {
            failure_type: FailureType::SelectorNotFound,
            confidence: 0.8,
            selector: extract_selector(error_text),
        };
    }
    if regexes.timeout.iter().any(|re| re.is_match(error_text)) {
        return FailureClassification {
            failure_type: FailureType::Timeout,
            confidence: 0.85,
            selector: String::new(),
        };
    }
    FailureClassification {
        failure_type: FailureType::Unknown,
        confidence: 0.3,
        selector: extract_selector(error_text),
    }
}

/// Collect error text from per-case failure messages, falling back to
/// the raw output.
pub fn extract_error_messages(run_result: &RunResult) -> Vec<String> {
    let from_cases: Vec<String> = run_result
        .test_cases
        .iter()
        .filter(|c| matches!(c.status, CaseStatus::Failed | CaseStatus::Error))
        .map(|c| c.failure_message.clone())
        .filter(|m| !m.is_empty())
        .collect();
    if !from_cases.is_empty() {
        return from_cases;
    }
    if run_result.raw_output.is_empty() {
        Vec::new()
    } else {
        vec![run_result.raw_output.clone()]
    }
}

/// Strip a leading/trailing markdown fence from LLM output.
pub fn clean_code_blocks(code: &str) -> String {
    let mut lines: Vec<&str> = code.trim().lines().collect();
    if lines.first().map(|l| l.starts_with("```")).unwrap_or(false) {
        lines.remove(0);
        if lines.last().map(|l| l.trim() == "```").unwrap_or(false) {
            lines.pop();
        }
    }
    lines.join("\n").trim().to_string()
}

/// Scrape candidate selectors from a rendered HTML document.
pub fn snapshot_from_html(html: &str) -> DomSnapshot {
    let mut snapshot = DomSnapshot::default();
    let test_id_re = Regex::new(r#"data-testid=["']([^"']+)["']"#).unwrap();
    let role_re = Regex::new(r#"role=["']([^"']+)["']"#).unwrap();
    let id_re = Regex::new(r#"id=["']([^"']+)["']"#).unwrap();
    let text_re = Regex::new(r">([^<>{}\n]{3,60})<").unwrap();

    for caps in test_id_re.captures_iter(html) {
        let value = caps[1].to_string();
        snapshot.selectors.push(format!("[data-testid=\"{value}\"]"));
        snapshot.test_ids.push(value);
    }
    for caps in role_re.captures_iter(html) {
        snapshot.roles.push(caps[1].to_string());
    }
    for caps in id_re.captures_iter(html) {
        snapshot.selectors.push(format!("#{}", &caps[1]));
    }
    for caps in text_re.captures_iter(html) {
        let text = caps[1].trim().to_string();
        if !text.is_empty() {
            snapshot.text_content.push(text);
        }
    }
    snapshot.test_ids.dedup();
    snapshot.roles.dedup();
    snapshot.selectors.dedup();
    snapshot
}

/// The healing engine.
pub struct SelfHealingEngine {
    engine: Arc<dyn LlmEngine>,
    adapter: Arc<dyn TestAdapter>,
    pub flaky_test_retries: u32,
    pub max_healing_attempts: u32,
    /// Base URL of the application for live DOM capture.
    base_url: Option<String>,
    /// Snapshot used when the application is unreachable.
    cached_snapshot: Option<DomSnapshot>,
}

impl SelfHealingEngine {
    pub fn new(engine: Arc<dyn LlmEngine>, adapter: Arc<dyn TestAdapter>) -> Self {
        Self {
            engine,
            adapter,
            flaky_test_retries: 3,
            max_healing_attempts: 2,
            base_url: None,
            cached_snapshot: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_cached_snapshot(mut self, snapshot: DomSnapshot) -> Self {
        self.cached_snapshot = Some(snapshot);
        self
    }

    /// Re-run the test several times; mixed outcomes mean flaky.
    pub async fn detect_flaky(&self, project_root: &Path, test_file: &Path) -> bool {
        let mut outcomes = Vec::new();
        for _ in 0..self.flaky_test_retries {
            match self
                .adapter
                .run_tests(project_root, Some(&[test_file.to_path_buf()]), 60, false)
                .await
            {
                Ok(result) => outcomes.push(result.success),
                Err(e) => {
                    warn!("flakiness probe run failed: {e}");
                    outcomes.push(false);
                }
            }
        }
        outcomes.iter().any(|&s| s) && outcomes.iter().any(|&s| !s)
    }

    async fn capture_snapshot(&self) -> DomSnapshot {
        if let Some(base_url) = &self.base_url {
            match reqwest::Client::new().get(base_url).send().await {
                Ok(response) => {
                    if let Ok(html) = response.text().await {
                        let snapshot = snapshot_from_html(&html);
                        if !snapshot.selectors.is_empty() || !snapshot.test_ids.is_empty() {
                            return snapshot;
                        }
                    }
                }
                Err(e) => warn!("live DOM capture failed, using cached snapshot: {e}"),
            }
        }
        self.cached_snapshot.clone().unwrap_or_default()
    }

    /// Attempt to heal a failing test.
    pub async fn heal_test(
        &self,
        test_code: &str,
        run_result: &RunResult,
        project_root: &Path,
        test_file: Option<&PathBuf>,
    ) -> HealingResult {
        let mut result = HealingResult::default();
        let errors = extract_error_messages(run_result);
        let error_text = errors.join("\n");
        let classification = classify_failure(&error_text);
        result
            .messages
            .push(format!("classified failure as {:?}", classification.failure_type));

        match classification.failure_type {
            FailureType::Timeout => {
                if let Some(file) = test_file {
                    result.is_flaky = self.detect_flaky(project_root, file).await;
                    if result.is_flaky {
                        result.messages.push(
                            "test is flaky (mixed outcomes across retries); skipping healing"
                                .into(),
                        );
                        result.failure_classification = Some(classification);
                        return result;
                    }
                }
                result.messages.push("timeout is consistent, not healing".into());
                result.failure_classification = Some(classification);
                result
            }
            FailureType::SelectorNotFound | FailureType::ElementNotVisible => {
                let snapshot = self.capture_snapshot().await;
                let healed = self
                    .heal_selector(test_code, &classification, &snapshot, &mut result.messages)
                    .await;
                if let Some(code) = healed {
                    result.healed = true;
                    result.healed_code = code;
                }
                result.failure_classification = Some(classification);
                result
            }
            FailureType::Unknown => {
                result
                    .messages
                    .push("failure type unknown; healing not attempted".into());
                result.failure_classification = Some(classification);
                result
            }
        }
    }

    async fn heal_selector(
        &self,
        test_code: &str,
        classification: &FailureClassification,
        snapshot: &DomSnapshot,
        messages: &mut Vec<String>,
    ) -> Option<String> {
        let template = PromptTemplate::healing();
        let context = json!({
            "old_selector": classification.selector,
            "test_code": test_code,
            "test_ids": snapshot.test_ids,
            "roles": snapshot.roles,
            "selectors": snapshot.selectors,
        });

        for attempt in 0..self.max_healing_attempts {
            let request_messages = match template.render(&context) {
                Ok(m) => m,
                Err(e) => {
                    messages.push(format!("healing prompt failed to render: {e}"));
                    return None;
                }
            };
            match self
                .engine
                .generate(GenerationRequest::from_messages(request_messages))
                .await
            {
                Ok(response) => {
                    let code = clean_code_blocks(&response.text);
                    let validation = self.adapter.validate(&code);
                    if validation.valid {
                        info!("selector healing succeeded on attempt {}", attempt + 1);
                        messages.push(format!("healed on attempt {}", attempt + 1));
                        return Some(code);
                    }
                    messages.push(format!(
                        "healed code failed validation on attempt {}: {}",
                        attempt + 1,
                        validation.errors.join("; ")
                    ));
                }
                Err(e) => {
                    messages.push(format!("healing generation failed: {e}"));
                    return None;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_not_found_classified() {
        let classification = classify_failure(
            "Error: locator('#login-button') resolved to 0 elements, selector '#login-button' not found",
        );
        assert_eq!(classification.failure_type, FailureType::SelectorNotFound);
        assert!(classification.confidence >= 0.8);
        assert!(classification.selector.contains("#login-button"));
    }

    #[test]
    fn timeout_classified() {
        let classification = classify_failure("Test timeout 30000ms exceeded while waiting");
        assert_eq!(classification.failure_type, FailureType::Timeout);
        assert!(classification.confidence >= 0.8);
    }

    #[test]
    fn visibility_failure_maps_to_selector_class() {
        let classification =
            classify_failure("element is not visible: locator('.cta-banner button')");
        assert_eq!(classification.failure_type, FailureType::SelectorNotFound);
        assert!(!classification.selector.is_empty());
    }

    #[test]
    fn unknown_error_classified() {
        let classification = classify_failure("ReferenceError: frobnicate is not defined");
        assert_eq!(classification.failure_type, FailureType::Unknown);
    }

    #[test]
    fn selector_extraction_variants() {
        assert_eq!(extract_selector("locator('#submit') failed"), "#submit");
        assert_eq!(extract_selector("getByTestId('save-btn') not found"), "save-btn");
    }

    #[test]
    fn error_messages_prefer_case_failures() {
        let result = RunResult::from_cases(
            vec![
                nit_adapters::CaseResult {
                    name: "a".into(),
                    status: CaseStatus::Failed,
                    duration_ms: 1.0,
                    failure_message: "Error 1".into(),
                    file_path: String::new(),
                },
                nit_adapters::CaseResult {
                    name: "b".into(),
                    status: CaseStatus::Error,
                    duration_ms: 1.0,
                    failure_message: "Error 2".into(),
                    file_path: String::new(),
                },
            ],
            "raw output".into(),
        );
        let errors = extract_error_messages(&result);
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&"Error 1".to_string()));
    }

    #[test]
    fn fences_stripped() {
        let fenced = "```typescript\ntest('example', () => {});\n```";
        let cleaned = clean_code_blocks(fenced);
        assert!(!cleaned.contains("```"));
        assert!(cleaned.contains("test('example'"));

        let plain = "test('x', () => {});";
        assert_eq!(clean_code_blocks(plain), plain);
    }

    #[test]
    fn dom_snapshot_scraped_from_html() {
        let html = r#"
            <button data-testid="submit-btn" role="button">Submit</button>
            <input data-testid="email-input" id="email" />
        "#;
        let snapshot = snapshot_from_html(html);
        assert_eq!(snapshot.test_ids.len(), 2);
        assert!(snapshot.test_ids.contains(&"submit-btn".to_string()));
        assert!(snapshot.roles.contains(&"button".to_string()));
        assert!(snapshot.selectors.iter().any(|s| s == "#email"));
    }
}
