//! xUnit (.NET) adapter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;

use crate::detect::any_file_matching;
use crate::process::run_tool;
use crate::traits::TestAdapter;
use crate::types::{AdapterError, RunResult, ValidationResult};

pub struct XunitAdapter;

impl XunitAdapter {
    fn csproj_references_xunit(root: &Path) -> bool {
        let Ok(entries) = std::fs::read_dir(root) else {
            return false;
        };
        let mut candidates: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csproj"))
            .collect();
        // Common layout: test projects one level down.
        if let Ok(entries) = std::fs::read_dir(root) {
            for entry in entries.flatten() {
                if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    if let Ok(inner) = std::fs::read_dir(entry.path()) {
                        candidates.extend(
                            inner
                                .flatten()
                                .map(|e| e.path())
                                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csproj")),
                        );
                    }
                }
            }
        }
        candidates.iter().any(|p| {
            std::fs::read_to_string(p)
                .map(|text| text.contains("xunit"))
                .unwrap_or(false)
        })
    }

    /// Parse "Failed: 1, Passed: 5, Skipped: 0, Total: 6" summary lines.
    pub(super) fn parse_summary(output: &str) -> RunResult {
        let pick = |kind: &str| {
            Regex::new(&format!(r"{kind}:\s+(\d+)"))
                .ok()
                .and_then(|re| re.captures(output))
                .and_then(|c| c[1].parse::<u32>().ok())
                .unwrap_or(0)
        };
        let mut result =
            RunResult::from_counts(pick("Passed"), pick("Failed"), pick("Skipped"), 0);
        result.raw_output = output.to_string();
        result
    }
}

#[async_trait]
impl TestAdapter for XunitAdapter {
    fn name(&self) -> &'static str {
        "xunit"
    }

    fn language(&self) -> &'static str {
        "csharp"
    }

    fn detect(&self, root: &Path) -> bool {
        Self::csproj_references_xunit(root) || any_file_matching(root, "xunit.runner.json", 3)
    }

    fn test_patterns(&self) -> Vec<&'static str> {
        vec!["**/*Tests.cs", "**/*Test.cs"]
    }

    fn prompt_template(&self) -> &'static str {
        "unit_xunit"
    }

    async fn run_tests(
        &self,
        root: &Path,
        _test_files: Option<&[PathBuf]>,
        timeout_secs: u64,
        collect_coverage: bool,
    ) -> Result<RunResult, AdapterError> {
        let mut args = vec!["test", "--nologo"];
        if collect_coverage {
            args.extend(["--collect", "XPlat Code Coverage"]);
        }
        let output = match run_tool("dotnet", &args, root, timeout_secs).await {
            Ok(output) => output,
            Err(AdapterError::ToolNotFound(tool)) => {
                return Ok(RunResult::tool_missing(format!(
                    "{tool} not found; is the .NET SDK installed?"
                )));
            }
            Err(e) => return Err(e),
        };
        Ok(Self::parse_summary(&output.combined()))
    }

    fn validate(&self, code: &str) -> ValidationResult {
        // No C# grammar wired; structural checks only.
        let mut errors = Vec::new();
        let opens = code.matches('{').count();
        let closes = code.matches('}').count();
        if opens != closes {
            errors.push(format!("Unbalanced braces ({opens} open, {closes} close)"));
        }
        if !code.contains("[Fact]") && !code.contains("[Theory]") {
            errors.push("No [Fact] or [Theory] attributes found".into());
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
    fn detects_xunit_csproj() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Tests.csproj"),
            "<Project><ItemGroup><PackageReference Include=\"xunit\" Version=\"2.6.0\" /></ItemGroup></Project>",
        )
        .unwrap();
        assert!(XunitAdapter.detect(dir.path()));
    }

    #[test]
    fn parses_dotnet_summary() {
        let result = XunitAdapter::parse_summary(
            "Passed!  - Failed:     0, Passed:     5, Skipped:     1, Total:     6\n",
        );
        assert_eq!(result.passed, 5);
        assert_eq!(result.failed, 0);
        assert_eq!(result.skipped, 1);
        assert!(result.success);
    }

    #[test]
    fn validates_fact_attribute() {
        let code = "public class CalcTests {\n    [Fact]\n    public void Adds() { Assert.Equal(2, 1 + 1); }\n}\n";
        assert!(XunitAdapter.validate(code).valid);
        assert!(!XunitAdapter.validate("public class Foo {}").valid);
    }
}
