//! Python vulnerability heuristics.

use super::base::{compile, LanguagePatterns, SecurityPattern};
use crate::analyzers::security::{Severity, VulnerabilityType};

pub(super) fn patterns() -> LanguagePatterns {
    LanguagePatterns {
        language: "python",
        patterns: vec![
            SecurityPattern {
                vuln_type: VulnerabilityType::SqlInjection,
                title: "SQL built from an f-string",
                description: "User data interpolated into a SQL statement via f-string",
                severity: Severity::Critical,
                confidence: 0.9,
                cwe: "CWE-89",
                pattern: compile(r#"execute\w*\s*\(\s*f["']"#),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::SqlInjection,
                title: "SQL built with str.format",
                description: "User data interpolated into a SQL statement via .format()",
                severity: Severity::Critical,
                confidence: 0.9,
                cwe: "CWE-89",
                pattern: compile(r"execute\w*\s*\([^)]*\.format\s*\("),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::SqlInjection,
                title: "SQL built with % interpolation",
                description: "User data interpolated into a SQL statement via the % operator",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-89",
                pattern: compile(r#"execute\w*\s*\([^)]*["']\s*%\s*\("#),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::CommandInjection,
                title: "subprocess with shell=True and dynamic command",
                description: "A non-literal command is executed through the shell",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-78",
                pattern: compile(r#"subprocess\.\w+\s*\(\s*[^'"\s)][^,)]*,\s*shell\s*=\s*True"#),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::CommandInjection,
                title: "os.system with dynamic argument",
                description: "A non-literal string is passed to os.system",
                severity: Severity::Critical,
                confidence: 0.85,
                cwe: "CWE-78",
                pattern: compile(r#"os\.system\s*\(\s*[^'")]"#),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::InsecureDeserialization,
                title: "pickle.loads on untrusted data",
                description: "pickle deserialization executes arbitrary code",
                severity: Severity::Critical,
                confidence: 0.8,
                cwe: "CWE-502",
                pattern: compile(r"pickle\.loads?\s*\("),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::InsecureDeserialization,
                title: "yaml.load without a safe loader",
                description: "yaml.load with the default loader can instantiate objects",
                severity: Severity::High,
                confidence: 0.8,
                cwe: "CWE-502",
                pattern: compile(r"yaml\.load\s*\("),
                safe_pattern: Some(compile(r"Loader\s*=|safe_load")),
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::WeakCrypto,
                title: "MD5/SHA-1 hashing",
                description: "MD5 and SHA-1 are broken for security purposes",
                severity: Severity::Medium,
                confidence: 0.6,
                cwe: "CWE-327",
                pattern: compile(r"hashlib\.(md5|sha1)\s*\("),
                safe_pattern: Some(compile(r"(?i)checksum|etag|cache|fingerprint")),
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::Xss,
                title: "mark_safe on interpolated HTML",
                description: "mark_safe disables escaping for user-derived markup",
                severity: Severity::High,
                confidence: 0.8,
                cwe: "CWE-79",
                pattern: compile(r#"mark_safe\s*\(\s*f["']"#),
                safe_pattern: None,
            },
            SecurityPattern {
                vuln_type: VulnerabilityType::Ssrf,
                title: "HTTP request to an interpolated URL",
                description: "Request target is built from user-derived data",
                severity: Severity::High,
                confidence: 0.7,
                cwe: "CWE-918",
                pattern: compile(r#"requests\.\w+\s*\(\s*f["']"#),
                safe_pattern: None,
            },
        ],
    }
}
