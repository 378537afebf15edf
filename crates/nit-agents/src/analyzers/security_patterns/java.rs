//! Java vulnerability heuristics.

use super::base::{compile, LanguagePatterns, SecurityPattern};
use crate::analyzers::security::{Severity, VulnerabilityType};

pub(super) fn patterns() -> LanguagePatterns {
    LanguagePatterns {
        language: "java",
        patterns: vec![
            SecurityPattern {
                vuln_type: VulnerabilityType::SqlInjection,
                title: "SQL built by string concatenation",
                description: "User data concatenated into a JDBC statement",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-89",
                pattern: compile(r#"execute(Query|Update)?\s*\([^)]*"\s*\+"#),
                safe_pattern: Some(compile(r"prepareStatement")),
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::CommandInjection,
                title: "Runtime.exec with concatenated input",
                description: "A shell command is built from user data",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-78",
                pattern: compile(r#"Runtime\.getRuntime\(\)\.exec\s*\([^)]*\+"#),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::InsecureDeserialization,
                title: "Java object deserialization",
                description: "ObjectInputStream deserializes attacker-controlled data",
                severity: Severity::Critical,
                confidence: 0.75,
                cwe: "CWE-502",
                pattern: compile(r"new\s+ObjectInputStream\s*\("),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::WeakCrypto,
                title: "MD5/SHA-1 MessageDigest",
                description: "MD5 and SHA-1 are broken for security purposes",
                severity: Severity::Medium,
                confidence: 0.6,
                cwe: "CWE-327",
                pattern: compile(r#"MessageDigest\.getInstance\s*\(\s*"(MD5|SHA-?1)""#),
                safe_pattern: Some(compile(r"(?i)checksum|etag|cache")),
            },
        ],
    }
}
