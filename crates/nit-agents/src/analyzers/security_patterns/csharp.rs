//! C# vulnerability heuristics.

use super::base::{compile, LanguagePatterns, SecurityPattern};
use crate::analyzers::security::{Severity, VulnerabilityType};

pub(super) fn patterns() -> LanguagePatterns {
    LanguagePatterns {
        language: "csharp",
        patterns: vec![
            SecurityPattern {
                vuln_type: VulnerabilityType::SqlInjection,
                title: "SqlCommand built by concatenation",
                description: "User data concatenated into a SqlCommand text",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-89",
                pattern: compile(r#"new\s+SqlCommand\s*\([^)]*"\s*\+"#),
                safe_pattern: Some(compile(r"@\w+|Parameters\.Add")),
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::CommandInjection,
                title: "Process.Start with concatenated arguments",
                description: "A shell command is built from user data",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-78",
                pattern: compile(r#"Process\.Start\s*\([^)]*\+"#),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::InsecureDeserialization,
                title: "BinaryFormatter deserialization",
                description: "BinaryFormatter deserializes attacker-controlled data",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-502",
                pattern: compile(r"BinaryFormatter|\.Deserialize\s*\("),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::Xss,
                title: "Html.Raw renders unescaped markup",
                description: "Html.Raw bypasses Razor escaping",
                severity: Severity::High,
                confidence: 0.75,
                cwe: "CWE-79",
                pattern: compile(r"Html\.Raw\s*\("),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::WeakCrypto,
                title: "MD5/SHA-1 hashing",
                description: "MD5 and SHA-1 are broken for security purposes",
                severity: Severity::Medium,
                confidence: 0.6,
                cwe: "CWE-327",
                pattern: compile(r"\b(MD5|SHA1)\.Create\s*\("),
                safe_pattern: Some(compile(r"(?i)checksum|etag|cache")),
            },
        ],
    }
}
