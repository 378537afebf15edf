//! Thin wrapper around the tree-sitter runtime.
//!
//! Language detection is by file extension, case-insensitive. Grammar
//! handles are process-wide; a fresh `Parser` is built per parse call so
//! parsing is safe from any thread.

use std::path::Path;

use tree_sitter::{Language, Node, Parser, Query, QueryCursor, Tree};

use crate::types::ParseError;

/// Language ids accepted by `parse_code` and the extractor registry.
pub const SUPPORTED_LANGUAGES: [&str; 9] = [
    "python",
    "javascript",
    "typescript",
    "tsx",
    "c",
    "cpp",
    "java",
    "go",
    "rust",
];

/// Map a path to a language id by extension (case-insensitive).
pub fn detect_language(path: impl AsRef<Path>) -> Option<&'static str> {
    let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "py" => Some("python"),
        "js" | "mjs" | "cjs" | "jsx" => Some("javascript"),
        "ts" | "mts" | "cts" => Some("typescript"),
        "tsx" => Some("tsx"),
        "c" | "h" => Some("c"),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some("cpp"),
        "java" => Some("java"),
        "go" => Some("go"),
        "rs" => Some("rust"),
        _ => None,
    }
}

pub(crate) fn grammar_for(language: &str) -> Result<Language, ParseError> {
    match language {
        "python" => Ok(tree_sitter_python::language()),
        "javascript" => Ok(tree_sitter_javascript::language()),
        "typescript" => Ok(tree_sitter_typescript::language_typescript()),
        "tsx" => Ok(tree_sitter_typescript::language_tsx()),
        "c" => Ok(tree_sitter_c::language()),
        "cpp" => Ok(tree_sitter_cpp::language()),
        "java" => Ok(tree_sitter_java::language()),
        "go" => Ok(tree_sitter_go::language()),
        "rust" => Ok(tree_sitter_rust::language()),
        other => Err(ParseError::UnsupportedLanguage(other.to_string())),
    }
}

/// Parse `source` as `language`, returning the concrete syntax tree.
pub fn parse_code(source: &[u8], language: &str) -> Result<Tree, ParseError> {
    let grammar = grammar_for(language)?;
    let mut parser = Parser::new();
    parser
        .set_language(grammar)
        .map_err(|e| ParseError::Grammar {
            language: language.to_string(),
            reason: e.to_string(),
        })?;
    parser.parse(source, None).ok_or_else(|| ParseError::Grammar {
        language: language.to_string(),
        reason: "parser returned no tree".to_string(),
    })
}

/// Whether the tree below `node` contains any error or missing nodes.
pub fn has_parse_errors(node: Node<'_>) -> bool {
    node.has_error()
}

/// One captured node from an AST query.
#[derive(Debug, Clone)]
pub struct QueryCaptureInfo {
    pub capture_name: String,
    pub kind: String,
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// One match produced by `query_ast`.
#[derive(Debug, Clone)]
pub struct QueryMatchInfo {
    pub pattern_index: usize,
    pub captures: Vec<QueryCaptureInfo>,
}

impl QueryMatchInfo {
    /// Texts captured under `name`, in document order.
    pub fn texts_for(&self, name: &str) -> Vec<&str> {
        self.captures
            .iter()
            .filter(|c| c.capture_name == name)
            .map(|c| c.text.as_str())
            .collect()
    }
}

/// Run an s-expression query against a parsed tree and return owned
/// match data (capture name, node kind, node text, line span).
pub fn query_ast(
    root: Node<'_>,
    language: &str,
    source: &[u8],
    s_expr: &str,
) -> Result<Vec<QueryMatchInfo>, ParseError> {
    let grammar = grammar_for(language)?;
    let query = Query::new(grammar, s_expr).map_err(|e| ParseError::Grammar {
        language: language.to_string(),
        reason: format!("bad query: {e}"),
    })?;
    let capture_names: Vec<String> = query.capture_names().to_vec();

    let mut cursor = QueryCursor::new();
    let mut results = Vec::new();
    for m in cursor.matches(&query, root, source) {
        let captures = m
            .captures
            .iter()
            .map(|capture| {
                let node = capture.node;
                QueryCaptureInfo {
                    capture_name: capture_names
                        .get(capture.index as usize)
                        .cloned()
                        .unwrap_or_default(),
                    kind: node.kind().to_string(),
                    text: node.utf8_text(source).unwrap_or_default().to_string(),
                    start_line: node.start_position().row + 1,
                    end_line: node.end_position().row + 1,
                }
            })
            .collect();
        results.push(QueryMatchInfo {
            pattern_index: m.pattern_index,
            captures,
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_extensions() {
        assert_eq!(detect_language("main.py"), Some("python"));
        assert_eq!(detect_language("app.mjs"), Some("javascript"));
        assert_eq!(detect_language("app.cts"), Some("typescript"));
        assert_eq!(detect_language("component.tsx"), Some("tsx"));
        assert_eq!(detect_language("header.h"), Some("c"));
        assert_eq!(detect_language("main.cxx"), Some("cpp"));
        assert_eq!(detect_language("Main.java"), Some("java"));
        assert_eq!(detect_language("main.go"), Some("go"));
        assert_eq!(detect_language("lib.rs"), Some("rust"));
    }

    #[test]
    fn detection_is_case_insensitive() {
        assert_eq!(detect_language("FILE.PY"), Some("python"));
        assert_eq!(detect_language("Main.JAVA"), Some("java"));
    }

    #[test]
    fn unknown_extensions_are_none() {
        assert_eq!(detect_language("data.csv"), None);
        assert_eq!(detect_language("Makefile"), None);
    }

    #[test]
    fn parse_produces_tree() {
        let tree = parse_code(b"def hello(): pass", "python").unwrap();
        assert_eq!(tree.root_node().kind(), "module");
        assert!(!has_parse_errors(tree.root_node()));
    }

    #[test]
    fn parse_error_detected() {
        let tree = parse_code(b"def (broken syntax", "python").unwrap();
        assert!(has_parse_errors(tree.root_node()));
    }

    #[test]
    fn unsupported_language_rejected() {
        assert!(matches!(
            parse_code(b"code", "cobol"),
            Err(ParseError::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn query_captures_function_names() {
        let source = b"def foo(): pass\ndef bar(): pass";
        let tree = parse_code(source, "python").unwrap();
        let matches = query_ast(
            tree.root_node(),
            "python",
            source,
            "(function_definition name: (identifier) @name)",
        )
        .unwrap();
        let names: Vec<&str> = matches.iter().flat_map(|m| m.texts_for("name")).collect();
        assert_eq!(names, vec!["foo", "bar"]);
    }
}
