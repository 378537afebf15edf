//! Language-specific structure extractors.
//!
//! The registry maps language id to a boxed extractor and is immutable
//! after first use. Each extractor walks the concrete syntax tree and
//! fills a `ParseResult`; parse errors mark `has_errors` but partial
//! extraction still runs.

mod c;
mod cpp;
mod go;
mod java;
mod js_ts;
mod python;
mod rust_lang;

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use tree_sitter::Node;

use crate::treesitter::{detect_language, has_parse_errors, parse_code};
use crate::types::{ParseError, ParseResult};

/// A structure extractor for one language.
pub trait Extractor: Send + Sync {
    fn language(&self) -> &'static str;
    fn extract(&self, root: Node<'_>, source: &[u8], result: &mut ParseResult);
}

fn registry() -> &'static HashMap<&'static str, Box<dyn Extractor>> {
    static REGISTRY: OnceLock<HashMap<&'static str, Box<dyn Extractor>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let extractors: Vec<Box<dyn Extractor>> = vec![
            Box::new(python::PythonExtractor),
            Box::new(js_ts::JsTsExtractor::new("javascript")),
            Box::new(js_ts::JsTsExtractor::new("typescript")),
            Box::new(js_ts::JsTsExtractor::new("tsx")),
            Box::new(c::CExtractor),
            Box::new(cpp::CppExtractor),
            Box::new(java::JavaExtractor),
            Box::new(go::GoExtractor),
            Box::new(rust_lang::RustExtractor),
        ];
        extractors.into_iter().map(|e| (e.language(), e)).collect()
    })
}

/// Fetch the extractor for `language`, erroring on unknown ids.
pub fn get_extractor(language: &str) -> Result<&'static dyn Extractor, ParseError> {
    registry()
        .get(language)
        .map(|b| b.as_ref())
        .ok_or_else(|| ParseError::NoExtractor(language.to_string()))
}

/// Parse `source` and extract functions, classes, and imports.
pub fn extract_from_source(source: &[u8], language: &str) -> Result<ParseResult, ParseError> {
    let extractor = get_extractor(language)?;
    let tree = parse_code(source, language)?;
    let mut result = ParseResult::empty(language);
    result.has_errors = has_parse_errors(tree.root_node());
    extractor.extract(tree.root_node(), source, &mut result);
    Ok(result)
}

/// Read a file, detect its language, and extract.
pub fn extract_from_file(path: impl AsRef<Path>) -> Result<ParseResult, ParseError> {
    let path = path.as_ref();
    let language = detect_language(path)
        .ok_or_else(|| ParseError::UnsupportedLanguage(path.display().to_string()))?;
    let source = std::fs::read(path)?;
    extract_from_source(&source, language)
}

// ── Shared node helpers ─────────────────────────────────────────────

pub(crate) fn node_text(node: Node<'_>, source: &[u8]) -> String {
    node.utf8_text(source).unwrap_or_default().to_string()
}

pub(crate) fn start_line(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

pub(crate) fn end_line(node: Node<'_>) -> usize {
    node.end_position().row + 1
}

pub(crate) fn field_text(node: Node<'_>, field: &str, source: &[u8]) -> String {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source))
        .unwrap_or_default()
}

/// Iterate named children of `node` into a Vec (cursor-free convenience).
pub(crate) fn named_children<'a>(node: Node<'a>) -> Vec<Node<'a>> {
    (0..node.named_child_count())
        .filter_map(|i| node.named_child(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treesitter::SUPPORTED_LANGUAGES;

    #[test]
    fn every_supported_language_has_an_extractor() {
        for lang in SUPPORTED_LANGUAGES {
            let extractor = get_extractor(lang).unwrap();
            assert_eq!(extractor.language(), lang);
        }
    }

    #[test]
    fn unknown_language_has_no_extractor() {
        assert!(matches!(
            get_extractor("cobol"),
            Err(ParseError::NoExtractor(_))
        ));
    }

    #[test]
    fn empty_source_gives_empty_result() {
        let result = extract_from_source(b"", "python").unwrap();
        assert!(result.functions.is_empty());
        assert!(result.classes.is_empty());
        assert!(result.imports.is_empty());
        assert!(!result.has_errors);
    }

    #[test]
    fn syntax_error_sets_flag_without_aborting() {
        let result = extract_from_source(b"def (broken", "python").unwrap();
        assert!(result.has_errors);
    }
}
