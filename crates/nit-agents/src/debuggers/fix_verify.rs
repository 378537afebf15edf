//! Fix verifier.
//!
//! The one agent that mutates project source, so it is transactional:
//! the original is backed up and a sentinel is written BEFORE the file
//! is touched; the sentinel is removed only after the original is
//! restored. Startup recovery replays any sentinel left by a crash.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use nit_adapters::{CaseStatus, TestAdapter};
use nit_core::state::{fix_backups_dir, fix_sentinel_path};
use nit_core::{Agent, TaskInput, TaskOutput};

use super::fix_gen::GeneratedFix;

const MAX_OUTPUT_CHARS: usize = 2000;
const MAX_FAILING_TESTS_SHOWN: usize = 5;

/// Outcome of verifying one fix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// bug_fixed ∧ ¬regressions_found.
    pub is_verified: bool,
    pub bug_fixed: bool,
    pub regressions_found: bool,
    pub test_results: String,
    pub failing_tests: Vec<String>,
    pub notes: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Sentinel {
    original_path: String,
    backup_path: String,
}

fn write_sentinel(project_root: &Path, original: &Path, backup: &Path) -> std::io::Result<()> {
    let sentinel = Sentinel {
        original_path: original.display().to_string(),
        backup_path: backup.display().to_string(),
    };
    let path = fix_sentinel_path(project_root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(&sentinel)?)
}

fn remove_sentinel(project_root: &Path) {
    let path = fix_sentinel_path(project_root);
    if path.exists() {
        let _ = std::fs::remove_file(&path);
    }
}

/// Startup crash recovery: if a sentinel exists, restore the backup
/// unconditionally, then delete the sentinel. Returns whether a restore
/// happened.
pub fn restore_pending_fixes(project_root: &Path) -> bool {
    let sentinel_path = fix_sentinel_path(project_root);
    if !sentinel_path.is_file() {
        return false;
    }

    let restored = (|| -> Option<()> {
        let text = std::fs::read_to_string(&sentinel_path).ok()?;
        let sentinel: Sentinel = serde_json::from_str(&text).ok()?;
        let backup = PathBuf::from(&sentinel.backup_path);
        let original = PathBuf::from(&sentinel.original_path);
        if backup.is_file() {
            std::fs::copy(&backup, &original).ok()?;
            warn!(
                "restored {} from crash-recovery backup {}",
                original.display(),
                backup.display()
            );
        } else {
            warn!("sentinel found but backup missing: {}", backup.display());
        }
        Some(())
    })()
    .is_some();

    let _ = std::fs::remove_file(&sentinel_path);
    restored
}

pub struct FixVerifier {
    project_root: PathBuf,
    adapter: Arc<dyn TestAdapter>,
    reproduction_timeout_secs: u64,
    suite_timeout_secs: u64,
}

impl FixVerifier {
    pub fn new(project_root: PathBuf, adapter: Arc<dyn TestAdapter>) -> Self {
        // Any interrupted previous run is healed before new work starts.
        restore_pending_fixes(&project_root);
        Self {
            project_root,
            adapter,
            reproduction_timeout_secs: 30,
            suite_timeout_secs: 120,
        }
    }

    fn resolve_target(&self, file_path: &str) -> PathBuf {
        let path = Path::new(file_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(file_path)
        }
    }

    fn backup_file(&self, target: &Path) -> std::io::Result<PathBuf> {
        let backups = fix_backups_dir(&self.project_root);
        std::fs::create_dir_all(&backups)?;
        let timestamp = chrono::Utc::now().timestamp_millis();
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".into());
        let backup = backups.join(format!("{name}.{timestamp}.bak"));
        std::fs::copy(target, &backup)?;
        Ok(backup)
    }

    async fn bug_fixed(&self, reproduction_test: &str) -> bool {
        if reproduction_test.is_empty() {
            warn!("no reproduction test provided; assuming the bug is fixed");
            return true;
        }
        let test_path = self.resolve_target(reproduction_test);
        if !test_path.is_file() {
            warn!("reproduction test missing: {}", test_path.display());
            return true;
        }
        match self
            .adapter
            .run_tests(
                &self.project_root,
                Some(&[test_path]),
                self.reproduction_timeout_secs,
                false,
            )
            .await
        {
            Ok(result) if !result.test_cases.is_empty() => result
                .test_cases
                .iter()
                .all(|c| c.status == CaseStatus::Passed),
            Ok(result) => result.success,
            Err(e) => {
                warn!("reproduction test run failed: {e}");
                false
            }
        }
    }

    async fn check_regressions(&self) -> (bool, String, Vec<String>) {
        match self
            .adapter
            .run_tests(&self.project_root, None, self.suite_timeout_secs, false)
            .await
        {
            Ok(result) => {
                let output: String = result.raw_output.chars().take(MAX_OUTPUT_CHARS).collect();
                let failing: Vec<String> = result
                    .test_cases
                    .iter()
                    .filter(|c| c.status != CaseStatus::Passed && c.status != CaseStatus::Skipped)
                    .map(|c| c.name.clone())
                    .collect();
                if !failing.is_empty() {
                    (true, output, failing)
                } else if result.test_cases.is_empty() && !result.success {
                    (true, output, vec!["(unknown - see output)".into()])
                } else {
                    (false, output, Vec::new())
                }
            }
            Err(e) => (
                true,
                format!("Test execution failed: {e}"),
                vec!["(test run failed)".into()],
            ),
        }
    }

    fn notes(
        is_verified: bool,
        bug_fixed: bool,
        regressions_found: bool,
        failing_tests: &[String],
    ) -> String {
        if is_verified {
            return "Fix verified. Bug is fixed and no regressions detected.".into();
        }
        let mut parts = Vec::new();
        if !bug_fixed {
            parts.push(
                "Bug not fixed - the reproduction test still fails. The fix may be incomplete."
                    .to_string(),
            );
        }
        if regressions_found {
            parts.push(format!(
                "Regressions detected - {} test(s) started failing after applying the fix:",
                failing_tests.len()
            ));
            for name in failing_tests.iter().take(MAX_FAILING_TESTS_SHOWN) {
                parts.push(format!("  - {name}"));
            }
            if failing_tests.len() > MAX_FAILING_TESTS_SHOWN {
                parts.push(format!(
                    "  ... and {} more",
                    failing_tests.len() - MAX_FAILING_TESTS_SHOWN
                ));
            }
        }
        if parts.is_empty() {
            parts.push("Verification inconclusive; manual review recommended.".into());
        }
        parts.join("\n")
    }

    /// Verify a fix transactionally. The target file is byte-identical
    /// to its pre-call state when this returns, normally or not, and the
    /// sentinel is gone.
    pub async fn verify(
        &self,
        fix: &GeneratedFix,
        reproduction_test: &str,
    ) -> Result<VerificationReport, String> {
        let target = self.resolve_target(&fix.file_path);
        if !target.is_file() {
            return Err(format!("target file missing: {}", target.display()));
        }

        // 1. Backup. 2. Sentinel BEFORE mutating.
        let backup = self.backup_file(&target).map_err(|e| e.to_string())?;
        write_sentinel(&self.project_root, &target, &backup).map_err(|e| e.to_string())?;

        // 3. Apply, verify, always restore.
        let apply_result = std::fs::write(&target, &fix.fixed_code);
        let report = match apply_result {
            Err(e) => Err(format!("could not apply fix: {e}")),
            Ok(()) => {
                info!("applied candidate fix to {}", target.display());
                let bug_fixed = self.bug_fixed(reproduction_test).await;
                let (regressions_found, test_results, failing_tests) =
                    self.check_regressions().await;
                let is_verified = bug_fixed && !regressions_found;
                Ok(VerificationReport {
                    is_verified,
                    bug_fixed,
                    regressions_found,
                    notes: Self::notes(is_verified, bug_fixed, regressions_found, &failing_tests),
                    test_results,
                    failing_tests,
                })
            }
        };

        // 4. Restore the original and clear the sentinel regardless of
        // how verification went.
        let restore_result = std::fs::copy(&backup, &target);
        remove_sentinel(&self.project_root);
        if let Err(e) = restore_result {
            return Err(format!(
                "CRITICAL: failed to restore {} from {}: {e}",
                target.display(),
                backup.display()
            ));
        }
        info!("restored original {}", target.display());

        report
    }
}

#[async_trait]
impl Agent for FixVerifier {
    fn name(&self) -> &str {
        "fix-verifier"
    }

    fn description(&self) -> &str {
        "Verify fixes transactionally: apply, test, restore"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let fix: GeneratedFix = match task.context.get("fix").cloned().map(serde_json::from_value) {
            Some(Ok(fix)) => fix,
            Some(Err(e)) => return TaskOutput::failed_with(format!("bad fix payload: {e}")),
            None => return TaskOutput::failed_with("fix missing from task context"),
        };
        let reproduction_test = task
            .context
            .get("reproduction_test_file")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        match self.verify(&fix, &reproduction_test).await {
            Ok(report) => {
                let is_verified = report.is_verified;
                TaskOutput::completed(json!({
                    "verification": report,
                    "is_verified": is_verified,
                }))
            }
            Err(e) => TaskOutput::failed_with(e),
        }
    }
}
