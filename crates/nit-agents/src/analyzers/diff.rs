//! Diff analyzer: what changed between two git refs (or the working
//! tree and HEAD), split into source and test files, with the affected
//! counterpart mapping.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use nit_adapters::process::run_tool;
use nit_core::{Agent, TaskInput, TaskOutput};
use nit_parsing::detect_language;

#[derive(Debug, Clone, Serialize)]
pub struct FileDelta {
    pub path: String,
    pub added: u32,
    pub removed: u32,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffReport {
    pub changed_source_files: Vec<String>,
    pub changed_test_files: Vec<String>,
    /// Source files whose tests changed but they themselves did not.
    pub affected_source_files: Vec<String>,
    /// source file → test files that cover it (within the change set).
    pub source_to_tests: BTreeMap<String, Vec<String>>,
    pub deltas: Vec<FileDelta>,
}

/// Language-aware test-file classification by naming convention.
pub fn is_test_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    let language = detect_language(Path::new(path));
    match language {
        Some("python") => name.starts_with("test_") || name.ends_with("_test.py"),
        Some("javascript") | Some("typescript") | Some("tsx") => {
            name.contains(".test.") || name.contains(".spec.") || path.contains("__tests__/")
        }
        Some("go") => name.ends_with("_test.go"),
        Some("java") => name.ends_with("Test.java") || name.ends_with("Tests.java"),
        Some("rust") => path.starts_with("tests/") || path.contains("/tests/"),
        Some("c") | Some("cpp") => name.contains("_test.") || name.starts_with("test_"),
        _ => path.contains("/tests/") || name.starts_with("test_"),
    }
}

/// The source file a test file most plausibly covers, by stripping the
/// test affixes from its name.
pub fn source_candidate_for_test(test_path: &str) -> Option<String> {
    let name = test_path.rsplit('/').next()?;
    let stripped = name
        .strip_prefix("test_")
        .map(str::to_string)
        .or_else(|| {
            name.find(".test.")
                .or_else(|| name.find(".spec."))
                .map(|idx| {
                    let ext = name.rsplit('.').next().unwrap_or("");
                    format!("{}.{}", &name[..idx], ext)
                })
        })
        .or_else(|| name.strip_suffix("_test.go").map(|s| format!("{s}.go")))
        .or_else(|| name.strip_suffix("_test.py").map(|s| format!("{s}.py")))?;
    Some(stripped)
}

async fn git(root: &Path, args: &[&str]) -> Result<String, String> {
    let output = run_tool("git", args, root, 60)
        .await
        .map_err(|e| e.to_string())?;
    if output.exit_code != 0 {
        return Err(format!("git {} failed: {}", args.join(" "), output.stderr));
    }
    Ok(output.stdout)
}

/// Diff `base_ref..head_ref` (or worktree vs HEAD when both empty).
pub async fn analyze_diff(
    root: &Path,
    base_ref: Option<&str>,
    head_ref: Option<&str>,
) -> Result<DiffReport, String> {
    let range = match (base_ref, head_ref) {
        (Some(base), Some(head)) => Some(format!("{base}..{head}")),
        (Some(base), None) => Some(base.to_string()),
        _ => None,
    };

    let mut name_status_args = vec!["diff", "--name-status"];
    let mut numstat_args = vec!["diff", "--numstat"];
    if let Some(range) = &range {
        name_status_args.push(range);
        numstat_args.push(range);
    } else {
        name_status_args.push("HEAD");
        numstat_args.push("HEAD");
    }

    let name_status = git(root, &name_status_args).await?;
    let numstat = git(root, &numstat_args).await?;

    let mut deltas: BTreeMap<String, FileDelta> = BTreeMap::new();
    for line in name_status.lines() {
        let mut parts = line.split_whitespace();
        let (Some(status), Some(path)) = (parts.next(), parts.next_back()) else {
            continue;
        };
        deltas.insert(
            path.to_string(),
            FileDelta {
                path: path.to_string(),
                added: 0,
                removed: 0,
                status: status.chars().next().unwrap_or('M').to_string(),
            },
        );
    }
    for line in numstat.lines() {
        let mut parts = line.split_whitespace();
        let (Some(added), Some(removed), Some(path)) =
            (parts.next(), parts.next(), parts.next_back())
        else {
            continue;
        };
        if let Some(delta) = deltas.get_mut(path) {
            delta.added = added.parse().unwrap_or(0);
            delta.removed = removed.parse().unwrap_or(0);
        }
    }

    let mut report = DiffReport::default();
    for path in deltas.keys() {
        if is_test_file(path) {
            report.changed_test_files.push(path.clone());
        } else if detect_language(Path::new(path)).is_some() {
            report.changed_source_files.push(path.clone());
        }
    }

    // Map each changed source to changed tests that look related, and
    // surface sources only reachable through their changed tests.
    for test in &report.changed_test_files {
        let Some(candidate) = source_candidate_for_test(test) else {
            continue;
        };
        for source in deltas.keys().filter(|p| !is_test_file(p)) {
            if source.ends_with(&candidate) {
                report
                    .source_to_tests
                    .entry(source.clone())
                    .or_default()
                    .push(test.clone());
            }
        }
        // The covered source may be unchanged; report it as affected.
        let affected = report
            .changed_source_files
            .iter()
            .any(|s| s.ends_with(&candidate));
        if !affected {
            report.affected_source_files.push(candidate);
        }
    }
    report.affected_source_files.sort();
    report.affected_source_files.dedup();
    report.deltas = deltas.into_values().collect();
    Ok(report)
}

pub struct DiffAnalyzer;

#[async_trait]
impl Agent for DiffAnalyzer {
    fn name(&self) -> &str {
        "diff-analyzer"
    }

    fn description(&self) -> &str {
        "Classify changed files between git refs into source and test sets"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let root = PathBuf::from(&task.target);
        let base = task.context.get("base_ref").and_then(|v| v.as_str());
        let head = task.context.get("head_ref").and_then(|v| v.as_str());

        match analyze_diff(&root, base, head).await {
            Ok(report) => TaskOutput::completed(json!({
                "changed_source_files": report.changed_source_files,
                "changed_test_files": report.changed_test_files,
                "affected_source_files": report.affected_source_files,
                "source_to_tests": report.source_to_tests,
                "deltas": report.deltas,
            })),
            Err(e) => TaskOutput::failed_with(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_classification() {
        assert!(is_test_file("tests/test_calc.py"));
        assert!(is_test_file("src/calc_test.py"));
        assert!(is_test_file("src/utils.test.ts"));
        assert!(is_test_file("src/__tests__/utils.ts"));
        assert!(is_test_file("pkg/sum_test.go"));
        assert!(is_test_file("src/UserServiceTest.java"));
        assert!(!is_test_file("src/calc.py"));
        assert!(!is_test_file("src/utils.ts"));
    }

    #[test]
    fn source_candidates_derived_from_test_names() {
        assert_eq!(source_candidate_for_test("tests/test_calc.py").unwrap(), "calc.py");
        assert_eq!(source_candidate_for_test("src/utils.test.ts").unwrap(), "utils.ts");
        assert_eq!(source_candidate_for_test("pkg/sum_test.go").unwrap(), "sum.go");
    }

    async fn init_repo(dir: &Path) {
        for args in [
            vec!["init", "-q"],
            vec!["config", "user.email", "dev@example.com"],
            vec!["config", "user.name", "Dev"],
        ] {
            run_tool("git", &args, dir, 30).await.unwrap();
        }
    }

    #[tokio::test]
    async fn worktree_diff_classified() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path()).await;
        std::fs::write(dir.path().join("calc.py"), "def add(a, b):\n    return a + b\n").unwrap();
        std::fs::write(dir.path().join("test_calc.py"), "def test_add():\n    pass\n").unwrap();
        run_tool("git", &["add", "."], dir.path(), 30).await.unwrap();
        run_tool("git", &["commit", "-q", "-m", "initial"], dir.path(), 30)
            .await
            .unwrap();

        // Modify both files in the working tree.
        std::fs::write(
            dir.path().join("calc.py"),
            "def add(a, b):\n    return a + b\n\ndef sub(a, b):\n    return a - b\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("test_calc.py"),
            "def test_add():\n    assert True\n",
        )
        .unwrap();

        let report = analyze_diff(dir.path(), None, None).await.unwrap();
        assert_eq!(report.changed_source_files, vec!["calc.py"]);
        assert_eq!(report.changed_test_files, vec!["test_calc.py"]);
        assert_eq!(report.source_to_tests["calc.py"], vec!["test_calc.py"]);
        let calc = report.deltas.iter().find(|d| d.path == "calc.py").unwrap();
        assert!(calc.added >= 2);
    }
}
