//! JVM adapters: JUnit 5 (Maven/Gradle) and Kotest (Gradle).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use walkdir::WalkDir;

use crate::detect::manifest_contains;
use crate::junit::parse_junit_xml;
use crate::process::run_tool;
use crate::traits::TestAdapter;
use crate::types::{AdapterError, RunResult, ValidationResult};

fn gradle_or_maven_contains(root: &Path, needle: &str) -> bool {
    manifest_contains(root, "build.gradle", needle)
        || manifest_contains(root, "build.gradle.kts", needle)
        || manifest_contains(root, "pom.xml", needle)
}

/// Collect surefire/gradle JUnit XML reports written during the run.
fn collect_xml_reports(root: &Path) -> Option<RunResult> {
    let report_dirs = [
        root.join("target").join("surefire-reports"),
        root.join("build").join("test-results").join("test"),
    ];
    let mut merged: Option<RunResult> = None;
    for dir in report_dirs {
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir).max_depth(2).into_iter().flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("xml") {
                continue;
            }
            let Ok(xml) = std::fs::read_to_string(path) else {
                continue;
            };
            let Ok(parsed) = parse_junit_xml(&xml) else {
                continue;
            };
            merged = Some(match merged.take() {
                None => parsed,
                Some(mut acc) => {
                    let mut cases = acc.test_cases;
                    cases.extend(parsed.test_cases);
                    acc = RunResult::from_cases(cases, acc.raw_output);
                    acc
                }
            });
        }
    }
    merged
}

/// Text fallback over "Tests run: 5, Failures: 1, Errors: 0, Skipped: 0".
fn parse_maven_summary(output: &str) -> Option<RunResult> {
    let re =
        Regex::new(r"Tests run: (\d+), Failures: (\d+), Errors: (\d+), Skipped: (\d+)").ok()?;
    let caps = re.captures(output)?;
    let total: u32 = caps[1].parse().ok()?;
    let failures: u32 = caps[2].parse().ok()?;
    let errors: u32 = caps[3].parse().ok()?;
    let skipped: u32 = caps[4].parse().ok()?;
    let passed = total.saturating_sub(failures + errors + skipped);
    let mut result = RunResult::from_counts(passed, failures, skipped, errors);
    result.raw_output = output.to_string();
    Some(result)
}

async fn run_jvm_build(root: &Path, timeout_secs: u64) -> Result<RunResult, AdapterError> {
    let (tool, args): (&str, Vec<&str>) = if root.join("pom.xml").is_file() {
        ("mvn", vec!["test", "-B"])
    } else if root.join("gradlew").is_file() {
        ("./gradlew", vec!["test", "--console=plain"])
    } else {
        ("gradle", vec!["test", "--console=plain"])
    };

    // ./gradlew is project-local, not on PATH.
    let output = if tool == "./gradlew" {
        match run_tool("sh", &["-c", "./gradlew test --console=plain"], root, timeout_secs).await {
            Ok(output) => output,
            Err(e) => return Err(e),
        }
    } else {
        match run_tool(tool, &args, root, timeout_secs).await {
            Ok(output) => output,
            Err(AdapterError::ToolNotFound(t)) => {
                return Ok(RunResult::tool_missing(format!(
                    "{t} not found; is a JVM build tool installed?"
                )));
            }
            Err(e) => return Err(e),
        }
    };

    if let Some(mut result) = collect_xml_reports(root) {
        result.raw_output = output.combined();
        return Ok(result);
    }
    if let Some(result) = parse_maven_summary(&output.combined()) {
        return Ok(result);
    }
    Ok(RunResult {
        raw_output: output.combined(),
        success: false,
        ..Default::default()
    })
}

// ── JUnit 5 ─────────────────────────────────────────────────────────

pub struct Junit5Adapter;

#[async_trait]
impl TestAdapter for Junit5Adapter {
    fn name(&self) -> &'static str {
        "junit5"
    }

    fn language(&self) -> &'static str {
        "java"
    }

    fn detect(&self, root: &Path) -> bool {
        gradle_or_maven_contains(root, "junit-jupiter")
            || gradle_or_maven_contains(root, "org.junit.jupiter")
            || gradle_or_maven_contains(root, "junit5")
    }

    fn test_patterns(&self) -> Vec<&'static str> {
        vec!["**/*Test.java", "**/*Tests.java"]
    }

    fn prompt_template(&self) -> &'static str {
        "unit_junit5"
    }

    async fn run_tests(
        &self,
        root: &Path,
        _test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
        _collect_coverage: bool,
    ) -> Result<RunResult, AdapterError> {
        run_jvm_build(root, timeout_secs).await
    }

    fn validate(&self, code: &str) -> ValidationResult {
        match nit_parsing::extract_from_source(code.as_bytes(), "java") {
            Ok(parsed) if parsed.has_errors => {
                ValidationResult::invalid(vec!["Java syntax error in generated test".into()])
            }
            Ok(_) => {
                if code.contains("@Test") {
                    ValidationResult::ok()
                } else {
                    ValidationResult::invalid(vec!["No @Test methods found".into()])
                }
            }
            Err(e) => ValidationResult::invalid(vec![e.to_string()]),
        }
    }
}

// ── Kotest ──────────────────────────────────────────────────────────

pub struct KotestAdapter;

#[async_trait]
impl TestAdapter for KotestAdapter {
    fn name(&self) -> &'static str {
        "kotest"
    }

    fn language(&self) -> &'static str {
        "kotlin"
    }

    fn detect(&self, root: &Path) -> bool {
        gradle_or_maven_contains(root, "io.kotest")
            || gradle_or_maven_contains(root, "kotest-runner")
    }

    fn test_patterns(&self) -> Vec<&'static str> {
        vec!["**/*Test.kt", "**/*Spec.kt"]
    }

    fn prompt_template(&self) -> &'static str {
        "unit_kotest"
    }

    async fn run_tests(
        &self,
        root: &Path,
        _test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
        _collect_coverage: bool,
    ) -> Result<RunResult, AdapterError> {
        run_jvm_build(root, timeout_secs).await
    }

    fn validate(&self, code: &str) -> ValidationResult {
        // No Kotlin grammar wired; structural checks only.
        let mut errors = Vec::new();
        let opens = code.matches('{').count();
        let closes = code.matches('}').count();
        if opens != closes {
            errors.push(format!("Unbalanced braces ({opens} open, {closes} close)"));
        }
        let spec_styles = [
            "FunSpec", "StringSpec", "DescribeSpec", "ShouldSpec", "BehaviorSpec", "FreeSpec",
            "WordSpec", "@Test",
        ];
        if !spec_styles.iter().any(|s| code.contains(s)) {
            errors.push("No Kotest spec style or @Test annotation found".into());
        }
        if errors.is_empty() {
            ValidationResult::ok()
        } else {
            ValidationResult::invalid(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_junit5_in_gradle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("build.gradle"),
            "dependencies { testImplementation 'org.junit.jupiter:junit-jupiter:5.10.0' }\n",
        )
        .unwrap();
        assert!(Junit5Adapter.detect(dir.path()));
        assert!(!KotestAdapter.detect(dir.path()));
    }

    #[test]
    fn detects_kotest_in_gradle_kts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("build.gradle.kts"),
            "dependencies { testImplementation(\"io.kotest:kotest-runner-junit5:5.8.0\") }\n",
        )
        .unwrap();
        assert!(KotestAdapter.detect(dir.path()));
    }

    #[test]
    fn maven_summary_parsed() {
        let result =
            parse_maven_summary("Tests run: 5, Failures: 1, Errors: 0, Skipped: 1\n").unwrap();
        assert_eq!(result.passed, 3);
        assert_eq!(result.failed, 1);
        assert_eq!(result.skipped, 1);
        assert!(!result.success);
    }

    #[test]
    fn kotest_validation_checks_spec_style() {
        let code = "class CalcTest : FunSpec({\n    test(\"adds\") { (1 + 1) shouldBe 2 }\n})\n";
        assert!(KotestAdapter.validate(code).valid);
        assert!(!KotestAdapter.validate("class Foo {}").valid);
        assert!(!KotestAdapter.validate("class Foo : FunSpec({").valid);
    }
}
