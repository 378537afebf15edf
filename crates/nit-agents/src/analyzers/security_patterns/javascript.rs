//! JavaScript/TypeScript vulnerability heuristics.

use super::base::{compile, LanguagePatterns, SecurityPattern};
use crate::analyzers::security::{Severity, VulnerabilityType};

pub(super) fn patterns() -> LanguagePatterns {
    LanguagePatterns {
        language: "javascript",
        patterns: vec![
            SecurityPattern {
                vuln_type: VulnerabilityType::SqlInjection,
                title: "SQL built from a template literal",
                description: "User data interpolated into a SQL query string",
                severity: Severity::Critical,
                confidence: 0.9,
                cwe: "CWE-89",
                pattern: compile(r"\.(query|execute)\s*\(\s*`[^`]*\$\{"),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::SqlInjection,
                title: "SQL built by string concatenation",
                description: "User data concatenated into a SQL query string",
                severity: Severity::Critical,
                confidence: 0.8,
                cwe: "CWE-89",
                pattern: compile(r#"\.(query|execute)\s*\(\s*["'][^"']*["']\s*\+"#),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::CommandInjection,
                title: "Shell command with interpolated input",
                description: "exec/execSync runs a command built from user data",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-78",
                pattern: compile(r"exec(Sync)?\s*\(\s*`[^`]*\$\{"),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::Xss,
                title: "innerHTML assignment",
                description: "Unescaped markup assigned to innerHTML",
                severity: Severity::High,
                confidence: 0.7,
                cwe: "CWE-79",
                pattern: compile(r"\.innerHTML\s*="),
                safe_pattern: Some(compile(r"DOMPurify|sanitize")),
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::Xss,
                title: "dangerouslySetInnerHTML",
                description: "React escape hatch renders raw HTML",
                severity: Severity::High,
                confidence: 0.7,
                cwe: "CWE-79",
                pattern: compile(r"dangerouslySetInnerHTML"),
                safe_pattern: Some(compile(r"DOMPurify|sanitize")),
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::InsecureDeserialization,
                title: "eval of dynamic code",
                description: "eval executes arbitrary strings as code",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-95",
                pattern: compile(r#"\beval\s*\(\s*[^'")]"#),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::InsecureDeserialization,
                title: "new Function with dynamic body",
                description: "The Function constructor executes strings as code",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-95",
                pattern: compile(r"new\s+Function\s*\("),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::WeakCrypto,
                title: "MD5/SHA-1 hashing",
                description: "MD5 and SHA-1 are broken for security purposes",
                severity: Severity::Medium,
                confidence: 0.6,
                cwe: "CWE-327",
                pattern: compile(r#"createHash\s*\(\s*["'](md5|sha1)["']"#),
                safe_pattern: Some(compile(r"(?i)checksum|etag|cache")),
            },
        ],
    }
}
