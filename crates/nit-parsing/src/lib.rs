//! Source parsing with tree-sitter.
//!
//! One operation matters to the rest of the system:
//! `extract_from_source(bytes, language) -> ParseResult` with structured
//! functions, classes, and imports. Parse errors never abort — the result
//! carries `has_errors` and whatever could still be extracted.

pub mod extract;
pub mod treesitter;
pub mod types;

pub use extract::{extract_from_file, extract_from_source, get_extractor};
pub use treesitter::{
    detect_language, has_parse_errors, parse_code, query_ast, QueryCaptureInfo, QueryMatchInfo,
    SUPPORTED_LANGUAGES,
};
pub use types::{ClassInfo, FunctionInfo, ImportInfo, ParamInfo, ParseError, ParseResult};
