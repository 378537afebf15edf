//! Subprocess execution for adapters.
//!
//! Tools are invoked through absolute paths resolved from PATH, stdout
//! and stderr are captured, and every call takes an explicit timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tracing::debug;

use crate::types::AdapterError;

/// Captured output of a finished subprocess.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Resolve `tool` to an absolute path using PATH.
pub fn which(tool: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(tool);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Run `tool` with `args` in `cwd`, honoring `timeout_secs`.
///
/// A missing tool is `AdapterError::ToolNotFound`; an expired timeout
/// kills the child and returns `SubprocessTimeout`. A non-zero exit code
/// is NOT an error here — callers interpret it (failing tests exit
/// non-zero by design).
pub async fn run_tool(
    tool: &str,
    args: &[&str],
    cwd: &Path,
    timeout_secs: u64,
) -> Result<CommandOutput, AdapterError> {
    let program = which(tool).ok_or_else(|| AdapterError::ToolNotFound(tool.to_string()))?;
    debug!(tool = %program.display(), ?args, cwd = %cwd.display(), "running tool");

    let child = tokio::process::Command::new(&program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AdapterError::Subprocess(format!("failed to spawn {tool}: {e}")))?;

    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
        .await
        .map_err(|_| AdapterError::SubprocessTimeout {
            command: format!("{tool} {}", args.join(" ")),
            timeout_secs,
        })?
        .map_err(|e| AdapterError::Subprocess(e.to_string()))?;

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn which_finds_sh() {
        assert!(which("sh").is_some());
        assert!(which("definitely-not-a-real-tool-xyz").is_none());
    }

    #[tokio::test]
    async fn run_tool_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_tool("sh", &["-c", "echo hello"], dir.path(), 10)
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn run_tool_reports_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_tool("sh", &["-c", "echo oops >&2; exit 3"], dir.path(), 10)
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(out.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn run_tool_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_tool("sh", &["-c", "sleep 5"], dir.path(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::SubprocessTimeout { .. }));
    }

    #[tokio::test]
    async fn missing_tool_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_tool("definitely-not-a-real-tool-xyz", &[], dir.path(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::ToolNotFound(_)));
    }
}
