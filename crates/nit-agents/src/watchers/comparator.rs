//! Drift comparators: exact, regex, JSON-schema, and semantic.

use regex::Regex;
use serde::{Deserialize, Serialize};

use nit_llm::cosine_similarity;

pub const DEFAULT_SEMANTIC_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonType {
    Exact,
    Regex,
    Schema,
    Semantic,
}

/// Result of one comparison.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonOutcome {
    pub passed: bool,
    pub similarity_score: Option<f64>,
    pub error: Option<String>,
}

impl ComparisonOutcome {
    fn pass(similarity: Option<f64>) -> Self {
        Self {
            passed: true,
            similarity_score: similarity,
            error: None,
        }
    }

    fn fail(similarity: Option<f64>) -> Self {
        Self {
            passed: false,
            similarity_score: similarity,
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            similarity_score: None,
            error: Some(message.into()),
        }
    }
}

/// Stateless comparator over baseline and current outputs.
pub struct SemanticComparator;

impl SemanticComparator {
    /// Literal string equality.
    pub fn compare_exact(baseline: &str, current: &str) -> ComparisonOutcome {
        if baseline == current {
            ComparisonOutcome::pass(Some(1.0))
        } else {
            ComparisonOutcome::fail(Some(0.0))
        }
    }

    /// The stored pattern must match the current output.
    pub fn compare_regex(pattern: &str, current: &str) -> ComparisonOutcome {
        match Regex::new(pattern) {
            Ok(re) => {
                if re.is_match(current) {
                    ComparisonOutcome::pass(None)
                } else {
                    ComparisonOutcome::fail(None)
                }
            }
            Err(e) => ComparisonOutcome::error(format!("invalid pattern: {e}")),
        }
    }

    /// The current output must parse as JSON and validate against the
    /// stored schema.
    pub fn compare_schema(schema: &serde_json::Value, current: &str) -> ComparisonOutcome {
        let instance: serde_json::Value = match serde_json::from_str(current) {
            Ok(value) => value,
            Err(e) => return ComparisonOutcome::error(format!("output is not JSON: {e}")),
        };
        let compiled = match jsonschema::JSONSchema::compile(schema) {
            Ok(compiled) => compiled,
            Err(e) => return ComparisonOutcome::error(format!("invalid schema: {e}")),
        };
        if compiled.is_valid(&instance) {
            ComparisonOutcome::pass(None)
        } else {
            ComparisonOutcome::fail(None)
        }
    }

    /// Cosine similarity of embeddings must reach the threshold.
    pub fn compare_semantic(
        baseline_embedding: &[f32],
        current_embedding: &[f32],
        threshold: f64,
    ) -> ComparisonOutcome {
        if baseline_embedding.is_empty() || current_embedding.is_empty() {
            return ComparisonOutcome::error("missing embedding for semantic comparison");
        }
        let similarity = f64::from(cosine_similarity(baseline_embedding, current_embedding));
        if similarity >= threshold {
            ComparisonOutcome::pass(Some(similarity))
        } else {
            ComparisonOutcome::fail(Some(similarity))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_match_passes() {
        let outcome = SemanticComparator::compare_exact("hello drift\n", "hello drift\n");
        assert!(outcome.passed);
        let outcome = SemanticComparator::compare_exact("200", "100");
        assert!(!outcome.passed);
    }

    #[test]
    fn regex_pattern_matching() {
        assert!(SemanticComparator::compare_regex(r"^\d+ items$", "42 items").passed);
        assert!(!SemanticComparator::compare_regex(r"^\d+ items$", "no items").passed);
        assert!(SemanticComparator::compare_regex(r"[unclosed", "x").error.is_some());
    }

    #[test]
    fn schema_validation() {
        let schema = json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}},
            "required": ["id"]
        });
        assert!(SemanticComparator::compare_schema(&schema, r#"{"id": 42}"#).passed);
        assert!(!SemanticComparator::compare_schema(&schema, r#"{"name": "x"}"#).passed);
        assert!(SemanticComparator::compare_schema(&schema, "not json").error.is_some());
    }

    #[test]
    fn semantic_threshold() {
        let a = vec![1.0f32, 0.0, 0.0];
        let close = vec![0.98f32, 0.05, 0.0];
        let far = vec![0.0f32, 1.0, 0.0];

        let outcome = SemanticComparator::compare_semantic(&a, &close, 0.8);
        assert!(outcome.passed);
        assert!(outcome.similarity_score.unwrap() > 0.9);

        let outcome = SemanticComparator::compare_semantic(&a, &far, 0.8);
        assert!(!outcome.passed);

        let outcome = SemanticComparator::compare_semantic(&[], &a, 0.8);
        assert!(outcome.error.is_some());
    }
}
