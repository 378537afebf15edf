//! Declarative framework-detection rules.
//!
//! A framework is described by weighted signals; scoring combines the
//! strongest matched signal with a small breadth bonus per additional
//! distinct signal type.

use serde::{Deserialize, Serialize};

/// What kind of artifact a framework is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkCategory {
    UnitTest,
    E2eTest,
    IntegrationTest,
    Documentation,
}

/// One piece of detection evidence with its weight in (0, 1].
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// A config file in the project matching this glob.
    ConfigFile { pattern: String, weight: f64 },
    /// A declared dependency (package.json, pyproject, requirements).
    Dependency {
        name: String,
        dev_only: bool,
        weight: f64,
    },
    /// A regex matched against collected source snippets.
    ImportPattern { pattern: String, weight: f64 },
    /// A glob matched against project-relative paths.
    FilePattern { glob: String, weight: f64 },
    /// A regex matched against CMakeLists.txt content.
    CMakePattern { pattern: String, weight: f64 },
    /// A dot-path into package.json whose value contains a substring
    /// (empty substring = key presence).
    PackageJsonField {
        field_path: String,
        value_substring: String,
        weight: f64,
    },
}

impl Signal {
    pub fn weight(&self) -> f64 {
        match self {
            Signal::ConfigFile { weight, .. }
            | Signal::Dependency { weight, .. }
            | Signal::ImportPattern { weight, .. }
            | Signal::FilePattern { weight, .. }
            | Signal::CMakePattern { weight, .. }
            | Signal::PackageJsonField { weight, .. } => *weight,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Signal::ConfigFile { .. } => "ConfigFile",
            Signal::Dependency { .. } => "Dependency",
            Signal::ImportPattern { .. } => "ImportPattern",
            Signal::FilePattern { .. } => "FilePattern",
            Signal::CMakePattern { .. } => "CMakePattern",
            Signal::PackageJsonField { .. } => "PackageJsonField",
        }
    }

    pub fn config_file(pattern: &str) -> Self {
        Signal::ConfigFile {
            pattern: pattern.into(),
            weight: 0.9,
        }
    }

    pub fn dependency(name: &str) -> Self {
        Signal::Dependency {
            name: name.into(),
            dev_only: true,
            weight: 0.85,
        }
    }

    pub fn import_pattern(pattern: &str) -> Self {
        Signal::ImportPattern {
            pattern: pattern.into(),
            weight: 0.7,
        }
    }

    pub fn file_pattern(glob: &str) -> Self {
        Signal::FilePattern {
            glob: glob.into(),
            weight: 0.4,
        }
    }

    pub fn cmake_pattern(pattern: &str) -> Self {
        Signal::CMakePattern {
            pattern: pattern.into(),
            weight: 0.85,
        }
    }

    pub fn package_json_field(field_path: &str, value_substring: &str) -> Self {
        Signal::PackageJsonField {
            field_path: field_path.into(),
            value_substring: value_substring.into(),
            weight: 0.8,
        }
    }
}

/// A detection rule for one framework.
#[derive(Debug, Clone)]
pub struct FrameworkRule {
    pub name: &'static str,
    pub language: &'static str,
    pub category: FrameworkCategory,
    pub signals: Vec<Signal>,
}

/// One detected framework with its evidence.
#[derive(Debug, Clone)]
pub struct DetectedFramework {
    pub name: String,
    pub language: String,
    pub category: FrameworkCategory,
    pub confidence: f64,
    pub matched_signals: Vec<&'static str>,
}

/// Every framework detected for a project.
#[derive(Debug, Clone, Default)]
pub struct FrameworkProfile {
    pub root: String,
    pub frameworks: Vec<DetectedFramework>,
}

impl FrameworkProfile {
    pub fn best(&self, category: FrameworkCategory) -> Option<&DetectedFramework> {
        self.frameworks.iter().find(|f| f.category == category)
    }
}

/// Tunable scoring thresholds, defaulted to the shipped behavior.
#[derive(Debug, Clone, Copy)]
pub struct DetectionThresholds {
    /// Bonus per additional distinct signal type.
    pub breadth_bonus_step: f64,
    /// Cap on the accumulated breadth bonus.
    pub breadth_bonus_cap: f64,
    /// Minimum confidence to include a framework in results.
    pub min_confidence: f64,
    /// Below this, the framework is flagged for optional LLM
    /// disambiguation (never performed by the detector itself).
    pub llm_fallback_threshold: f64,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            breadth_bonus_step: 0.02,
            breadth_bonus_cap: 0.10,
            min_confidence: 0.3,
            llm_fallback_threshold: 0.8,
        }
    }
}

/// Built-in detection rules for every supported framework.
pub fn builtin_rules() -> Vec<FrameworkRule> {
    let mut rules = Vec::new();

    // ── JavaScript / TypeScript ──
    rules.push(FrameworkRule {
        name: "vitest",
        language: "javascript",
        category: FrameworkCategory::UnitTest,
        signals: vec![
            Signal::config_file("vitest.config.*"),
            Signal::config_file("vitest.workspace.*"),
            Signal::dependency("vitest"),
            Signal::import_pattern(r#"from\s+['"]vitest['"]"#),
            Signal::file_pattern("**/*.test.ts"),
            Signal::file_pattern("**/*.test.tsx"),
            Signal::file_pattern("**/*.spec.ts"),
            Signal::package_json_field("scripts.test", "vitest"),
        ],
    });
    rules.push(FrameworkRule {
        name: "jest",
        language: "javascript",
        category: FrameworkCategory::UnitTest,
        signals: vec![
            Signal::config_file("jest.config.*"),
            Signal::dependency("jest"),
            Signal::dependency("ts-jest"),
            Signal::import_pattern(r#"from\s+['"]@jest/globals['"]"#),
            Signal::file_pattern("**/*.test.js"),
            Signal::file_pattern("**/*.test.jsx"),
            Signal::file_pattern("**/*.spec.js"),
            Signal::package_json_field("scripts.test", "jest"),
            Signal::package_json_field("jest", ""),
        ],
    });
    rules.push(FrameworkRule {
        name: "mocha",
        language: "javascript",
        category: FrameworkCategory::UnitTest,
        signals: vec![
            Signal::config_file(".mocharc.*"),
            Signal::dependency("mocha"),
            Signal::import_pattern(r#"require\s*\(\s*['"]mocha['"]"#),
            Signal::package_json_field("scripts.test", "mocha"),
        ],
    });
    rules.push(FrameworkRule {
        name: "playwright",
        language: "javascript",
        category: FrameworkCategory::E2eTest,
        signals: vec![
            Signal::config_file("playwright.config.*"),
            Signal::dependency("@playwright/test"),
            Signal::import_pattern(r#"from\s+['"]@playwright/test['"]"#),
            Signal::file_pattern("**/e2e/**/*.ts"),
        ],
    });
    rules.push(FrameworkRule {
        name: "cypress",
        language: "javascript",
        category: FrameworkCategory::E2eTest,
        signals: vec![
            Signal::config_file("cypress.config.*"),
            Signal::config_file("cypress.json"),
            Signal::dependency("cypress"),
            Signal::file_pattern("cypress/e2e/**/*.cy.*"),
            Signal::package_json_field("scripts.cypress", "cypress"),
        ],
    });

    // ── Python ──
    rules.push(FrameworkRule {
        name: "pytest",
        language: "python",
        category: FrameworkCategory::UnitTest,
        signals: vec![
            Signal::config_file("conftest.py"),
            Signal::config_file("pytest.ini"),
            Signal::dependency("pytest"),
            Signal::import_pattern(r"import\s+pytest"),
            Signal::import_pattern(r"from\s+pytest\s+import"),
            Signal::file_pattern("**/test_*.py"),
            Signal::file_pattern("**/*_test.py"),
        ],
    });
    rules.push(FrameworkRule {
        name: "unittest",
        language: "python",
        category: FrameworkCategory::UnitTest,
        signals: vec![
            Signal::import_pattern(r"import\s+unittest"),
            Signal::import_pattern(r"from\s+unittest\s+import"),
            Signal::file_pattern("**/test_*.py"),
        ],
    });

    // ── Rust ──
    rules.push(FrameworkRule {
        name: "cargo-test",
        language: "rust",
        category: FrameworkCategory::UnitTest,
        signals: vec![
            Signal::config_file("Cargo.toml"),
            Signal::import_pattern(r"#\[test\]"),
            Signal::file_pattern("tests/**/*.rs"),
        ],
    });

    // ── Go ──
    rules.push(FrameworkRule {
        name: "go-test",
        language: "go",
        category: FrameworkCategory::UnitTest,
        signals: vec![
            Signal::config_file("go.mod"),
            Signal::import_pattern(r#""testing""#),
            Signal::file_pattern("**/*_test.go"),
        ],
    });

    // ── C / C++ ──
    rules.push(FrameworkRule {
        name: "gtest",
        language: "cpp",
        category: FrameworkCategory::UnitTest,
        signals: vec![
            Signal::cmake_pattern(r"find_package\s*\(\s*GTest"),
            Signal::cmake_pattern(r"gtest_discover_tests"),
            Signal::cmake_pattern(r"target_link_libraries\s*\([^)]*gtest"),
            Signal::import_pattern(r#"#include\s*[<"]gtest/gtest\.h[>"]"#),
            Signal::file_pattern("**/*_test.cpp"),
            Signal::file_pattern("**/*_test.cc"),
        ],
    });
    rules.push(FrameworkRule {
        name: "catch2",
        language: "cpp",
        category: FrameworkCategory::UnitTest,
        signals: vec![
            Signal::cmake_pattern(r"find_package\s*\(\s*Catch2"),
            Signal::cmake_pattern(r"catch_discover_tests"),
            Signal::cmake_pattern(r"target_link_libraries\s*\([^)]*Catch2::"),
            Signal::import_pattern(r#"#include\s*[<"](catch2/catch[^">]*|catch\.hpp)[>"]"#),
            Signal::file_pattern("**/*.catch2.cpp"),
        ],
    });

    // ── JVM ──
    rules.push(FrameworkRule {
        name: "junit5",
        language: "java",
        category: FrameworkCategory::UnitTest,
        signals: vec![
            Signal::import_pattern(r"import\s+org\.junit\.jupiter"),
            Signal::file_pattern("**/*Test.java"),
            Signal::file_pattern("**/*Tests.java"),
        ],
    });
    rules.push(FrameworkRule {
        name: "kotest",
        language: "kotlin",
        category: FrameworkCategory::UnitTest,
        signals: vec![
            Signal::import_pattern(r"import\s+io\.kotest"),
            Signal::file_pattern("**/*Spec.kt"),
        ],
    });

    // ── .NET ──
    rules.push(FrameworkRule {
        name: "xunit",
        language: "csharp",
        category: FrameworkCategory::UnitTest,
        signals: vec![
            Signal::config_file("xunit.runner.json"),
            Signal::import_pattern(r"using\s+Xunit"),
            Signal::file_pattern("**/*Tests.cs"),
        ],
    });

    rules
}
