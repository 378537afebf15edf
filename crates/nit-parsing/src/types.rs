//! Structured parse results shared by analyzers and builders.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("No extractor registered for language: {0}")]
    NoExtractor(String),

    #[error("Grammar error for {language}: {reason}")]
    Grammar { language: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A function or method parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    #[serde(default)]
    pub type_annotation: String,
    #[serde(default)]
    pub default_value: String,
}

/// A function, method, or arrow-function binding.
///
/// Line numbers are 1-based and within the source; `end_line >=
/// start_line`; `body_text` is a verbatim substring of the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default)]
    pub parameters: Vec<ParamInfo>,
    #[serde(default)]
    pub return_type: String,
    #[serde(default)]
    pub body_text: String,
    #[serde(default)]
    pub decorators: Vec<String>,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub is_method: bool,
}

/// A class, struct, or equivalent aggregate with its methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub methods: Vec<FunctionInfo>,
    #[serde(default)]
    pub decorators: Vec<String>,
}

/// A single import / include / use statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub module: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub is_wildcard: bool,
    #[serde(default)]
    pub line: usize,
}

/// Complete structural extraction for one source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseResult {
    pub language: String,
    #[serde(default)]
    pub functions: Vec<FunctionInfo>,
    #[serde(default)]
    pub classes: Vec<ClassInfo>,
    #[serde(default)]
    pub imports: Vec<ImportInfo>,
    #[serde(default)]
    pub has_errors: bool,
}

impl ParseResult {
    pub fn empty(language: &str) -> Self {
        Self {
            language: language.to_string(),
            ..Default::default()
        }
    }
}
