//! Language-specific security pattern packs.
//!
//! All regexes compile once at startup into an immutable registry shared
//! across scans.

mod base;
mod c_cpp;
mod csharp;
mod go;
mod java;
mod javascript;
mod python;
mod rust_lang;

pub use base::{
    detect_hardcoded_secrets, shannon_entropy, LanguagePatterns, PatternMatch, SecurityPattern,
};

use std::sync::OnceLock;

/// Pattern pack for a language id, or `None` if unsupported.
pub fn get_patterns_for_language(language: &str) -> Option<&'static LanguagePatterns> {
    static PYTHON: OnceLock<LanguagePatterns> = OnceLock::new();
    static JAVASCRIPT: OnceLock<LanguagePatterns> = OnceLock::new();
    static JAVA: OnceLock<LanguagePatterns> = OnceLock::new();
    static GO: OnceLock<LanguagePatterns> = OnceLock::new();
    static RUST: OnceLock<LanguagePatterns> = OnceLock::new();
    static C_CPP: OnceLock<LanguagePatterns> = OnceLock::new();
    static CSHARP: OnceLock<LanguagePatterns> = OnceLock::new();

    match language {
        "python" => Some(PYTHON.get_or_init(python::patterns)),
        "javascript" | "typescript" | "tsx" => Some(JAVASCRIPT.get_or_init(javascript::patterns)),
        "java" => Some(JAVA.get_or_init(java::patterns)),
        "go" => Some(GO.get_or_init(go::patterns)),
        "rust" => Some(RUST.get_or_init(rust_lang::patterns)),
        "c" | "cpp" => Some(C_CPP.get_or_init(c_cpp::patterns)),
        "csharp" => Some(CSHARP.get_or_init(csharp::patterns)),
        _ => None,
    }
}
