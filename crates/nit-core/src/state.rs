//! Layout of the mutable state directory under the project root.
//!
//! Everything Nit-R persists lives below `.nit/`; the rest of the project
//! tree is read-only to agents outside generated test output paths and
//! the fix-verification window.

use std::path::{Path, PathBuf};

pub const STATE_DIR: &str = ".nit";

pub fn nit_dir(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR)
}

pub fn memory_path(project_root: &Path) -> PathBuf {
    nit_dir(project_root).join("memory.json")
}

pub fn baselines_dir(project_root: &Path) -> PathBuf {
    nit_dir(project_root).join("drift-baselines")
}

pub fn drift_tests_path(project_root: &Path) -> PathBuf {
    nit_dir(project_root).join("drift-tests.yml")
}

pub fn tmp_dir(project_root: &Path) -> PathBuf {
    nit_dir(project_root).join("tmp")
}

pub fn fix_backups_dir(project_root: &Path) -> PathBuf {
    tmp_dir(project_root).join("fix_backups")
}

pub fn fix_sentinel_path(project_root: &Path) -> PathBuf {
    tmp_dir(project_root).join("fix_in_progress.json")
}

/// Write `contents` to `path` atomically: write a `.tmp` sibling, then
/// rename over the destination.
pub fn atomic_write(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("file.json");
        atomic_write(&target, "one").unwrap();
        atomic_write(&target, "two").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "two");
        assert!(!target.with_extension("tmp").exists());
    }
}
