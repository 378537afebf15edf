//! C/C++ vulnerability heuristics (shared by both languages).

use super::base::{compile, LanguagePatterns, SecurityPattern};
use crate::analyzers::security::{Severity, VulnerabilityType};

pub(super) fn patterns() -> LanguagePatterns {
    LanguagePatterns {
        language: "c",
        patterns: vec![
            SecurityPattern {
                vuln_type: VulnerabilityType::CommandInjection,
                title: "system() with dynamic argument",
                description: "A non-literal string is passed to system()",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-78",
                pattern: compile(r#"\bsystem\s*\(\s*[^")]"#),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::CommandInjection,
                title: "gets() is unbounded",
                description: "gets() cannot limit input length",
                severity: Severity::Critical,
                confidence: 0.95,
                cwe: "CWE-242",
                pattern: compile(r"\bgets\s*\("),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::CommandInjection,
                title: "strcpy() without bounds",
                description: "strcpy() copies without a length limit",
                severity: Severity::High,
                confidence: 0.75,
                cwe: "CWE-120",
                pattern: compile(r"\bstrcpy\s*\("),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::CommandInjection,
                title: "sprintf() without bounds",
                description: "sprintf() writes without a length limit",
                severity: Severity::High,
                confidence: 0.7,
                cwe: "CWE-120",
                pattern: compile(r"\bsprintf\s*\("),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::CommandInjection,
                title: "printf() with non-literal format",
                description: "A variable used as the format string",
                severity: Severity::High,
                confidence: 0.8,
                cwe: "CWE-134",
                pattern: compile(r"\bprintf\s*\(\s*[A-Za-z_]\w*\s*\)"),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::WeakCrypto,
                title: "MD5/SHA-1 hashing",
                description: "MD5 and SHA-1 are broken for security purposes",
                severity: Severity::Medium,
                confidence: 0.6,
                cwe: "CWE-327",
                pattern: compile(r"\b(MD5|SHA1)_(Init|Update|Final)\b"),
                safe_pattern: Some(compile(r"(?i)checksum|etag|cache")),
            },
        ],
    }
}
