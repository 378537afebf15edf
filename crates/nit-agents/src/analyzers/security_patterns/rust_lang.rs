//! Rust vulnerability heuristics.

use super::base::{compile, LanguagePatterns, SecurityPattern};
use crate::analyzers::security::{Severity, VulnerabilityType};

pub(super) fn patterns() -> LanguagePatterns {
    LanguagePatterns {
        language: "rust",
        patterns: vec![
            SecurityPattern {
                vuln_type: VulnerabilityType::SqlInjection,
                title: "SQL built with format!",
                description: "User data formatted into a SQL query string",
                severity: Severity::Critical,
                confidence: 0.9,
                cwe: "CWE-89",
                pattern: compile(r"query\w*\s*(?:\.|\()\s*&?\s*format!"),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::CommandInjection,
                title: "Command built with format!",
                description: "A process command is built from user data",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-78",
                pattern: compile(r"Command::new\s*\(\s*&?\s*format!"),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::WeakCrypto,
                title: "MD5/SHA-1 hashing",
                description: "MD5 and SHA-1 are broken for security purposes",
                severity: Severity::Medium,
                confidence: 0.6,
                cwe: "CWE-327",
                pattern: compile(r"\b(Md5|Sha1)::"),
                safe_pattern: Some(compile(r"(?i)checksum|etag|cache")),
            },
        ],
    }
}
