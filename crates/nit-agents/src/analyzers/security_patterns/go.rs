//! Go vulnerability heuristics.

use super::base::{compile, LanguagePatterns, SecurityPattern};
use crate::analyzers::security::{Severity, VulnerabilityType};

pub(super) fn patterns() -> LanguagePatterns {
    LanguagePatterns {
        language: "go",
        patterns: vec![
            SecurityPattern {
                vuln_type: VulnerabilityType::SqlInjection,
                title: "SQL built with fmt.Sprintf",
                description: "User data formatted into a SQL query string",
                severity: Severity::Critical,
                confidence: 0.9,
                cwe: "CWE-89",
                pattern: compile(r"\.(Query|Exec)\w*\s*\(\s*fmt\.Sprintf"),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::SqlInjection,
                title: "SQL built by string concatenation",
                description: "User data concatenated into a SQL query string",
                severity: Severity::Critical,
                confidence: 0.8,
                cwe: "CWE-89",
                pattern: compile(r#"\.(Query|Exec)\w*\s*\([^)]*"\s*\+"#),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::CommandInjection,
                title: "exec.Command with formatted input",
                description: "A command is built from user data",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-78",
                pattern: compile(r"exec\.Command\w*\s*\(\s*fmt\.Sprintf"),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::Xss,
                title: "template.HTML bypasses escaping",
                description: "template.HTML marks user data as pre-escaped markup",
                severity: Severity::High,
                confidence: 0.75,
                cwe: "CWE-79",
                pattern: compile(r"template\.HTML\s*\("),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::WeakCrypto,
                title: "MD5/SHA-1 hashing",
                description: "MD5 and SHA-1 are broken for security purposes",
                severity: Severity::Medium,
                confidence: 0.6,
                cwe: "CWE-327",
                pattern: compile(r"\b(md5|sha1)\.New\s*\("),
                safe_pattern: Some(compile(r"(?i)checksum|etag|cache")),
            },
        ],
    }
}
