//! Project-local learning memory.
//!
//! A single JSON document under `.nit/memory.json` accumulates what
//! generation runs learned about a project: the conventions its tests
//! follow, patterns that produced passing tests, patterns that failed
//! (with the reason), and rolling generation statistics. Builders read it
//! to bias prompts; analyzers seed it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::MemoryError;
use crate::state::{atomic_write, memory_path};

/// A pattern that produced a passing test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownPattern {
    pub pattern: String,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

/// A pattern that produced a failing test, with the failure reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPattern {
    pub pattern: String,
    pub reason: String,
}

/// Rolling generation statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_generated: u64,
    pub successful: u64,
    pub failed: u64,
    #[serde(default)]
    pub last_updated: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MemoryDocument {
    #[serde(default)]
    conventions: HashMap<String, serde_json::Value>,
    #[serde(default)]
    known_patterns: Vec<KnownPattern>,
    #[serde(default)]
    failed_patterns: Vec<FailedPattern>,
    #[serde(default)]
    stats: MemoryStats,
}

/// Persistent key-value memory for one project.
///
/// Loaded once on open; every mutation serializes and rewrites the file
/// atomically under an internal lock, so a read after a write always
/// observes the written values.
pub struct GlobalMemory {
    path: PathBuf,
    doc: Mutex<MemoryDocument>,
}

impl GlobalMemory {
    /// Open (or lazily create) the memory for `project_root`.
    pub fn open(project_root: &Path) -> Result<Self, MemoryError> {
        let path = memory_path(project_root);
        let doc = if path.is_file() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str(&text).unwrap_or_else(|e| {
                debug!("memory file unreadable, starting fresh: {e}");
                MemoryDocument::default()
            })
        } else {
            MemoryDocument::default()
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    pub fn set_conventions(
        &self,
        conventions: HashMap<String, serde_json::Value>,
    ) -> Result<(), MemoryError> {
        let mut doc = self.doc.lock().expect("memory lock poisoned");
        doc.conventions = conventions;
        self.flush(&doc)
    }

    pub fn conventions(&self) -> HashMap<String, serde_json::Value> {
        self.doc.lock().expect("memory lock poisoned").conventions.clone()
    }

    /// Record a pattern that worked. Duplicate pattern strings are merged.
    pub fn add_known_pattern(
        &self,
        pattern: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Result<(), MemoryError> {
        let pattern = pattern.into();
        let mut doc = self.doc.lock().expect("memory lock poisoned");
        match doc.known_patterns.iter().position(|p| p.pattern == pattern) {
            Some(index) => doc.known_patterns[index].context.extend(context),
            None => doc.known_patterns.push(KnownPattern { pattern, context }),
        }
        self.flush(&doc)
    }

    /// Record a pattern that failed, with the error summary as the reason.
    pub fn add_failed_pattern(
        &self,
        pattern: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<(), MemoryError> {
        let pattern = pattern.into();
        let reason = reason.into();
        let mut doc = self.doc.lock().expect("memory lock poisoned");
        match doc.failed_patterns.iter().position(|p| p.pattern == pattern) {
            Some(index) => doc.failed_patterns[index].reason = reason,
            None => doc.failed_patterns.push(FailedPattern { pattern, reason }),
        }
        self.flush(&doc)
    }

    /// Known patterns, optionally filtered by a substring matched against
    /// the pattern text or any string context value.
    pub fn get_known_patterns(&self, filter: Option<&str>) -> Vec<KnownPattern> {
        let doc = self.doc.lock().expect("memory lock poisoned");
        doc.known_patterns
            .iter()
            .filter(|p| match filter {
                None => true,
                Some(f) => {
                    p.pattern.contains(f)
                        || p.context
                            .values()
                            .any(|v| v.as_str().is_some_and(|s| s.contains(f)))
                }
            })
            .cloned()
            .collect()
    }

    pub fn get_failed_patterns(&self, filter: Option<&str>) -> Vec<FailedPattern> {
        let doc = self.doc.lock().expect("memory lock poisoned");
        doc.failed_patterns
            .iter()
            .filter(|p| match filter {
                None => true,
                Some(f) => p.pattern.contains(f) || p.reason.contains(f),
            })
            .cloned()
            .collect()
    }

    pub fn update_stats(&self, successful: bool, tests_generated: u64) -> Result<(), MemoryError> {
        let mut doc = self.doc.lock().expect("memory lock poisoned");
        doc.stats.total_generated += tests_generated;
        if successful {
            doc.stats.successful += tests_generated;
        } else {
            doc.stats.failed += tests_generated;
        }
        doc.stats.last_updated = Utc::now().to_rfc3339();
        self.flush(&doc)
    }

    pub fn stats(&self) -> MemoryStats {
        self.doc.lock().expect("memory lock poisoned").stats.clone()
    }

    fn flush(&self, doc: &MemoryDocument) -> Result<(), MemoryError> {
        let text = serde_json::to_string_pretty(doc)?;
        atomic_write(&self.path, &text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_in(dir: &tempfile::TempDir) -> GlobalMemory {
        GlobalMemory::open(dir.path()).unwrap()
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let memory = open_in(&dir);
        memory
            .add_known_pattern(
                "assertion_style:expect",
                HashMap::from([("language".into(), serde_json::json!("typescript"))]),
            )
            .unwrap();
        memory.update_stats(true, 2).unwrap();

        // Reopen from disk and verify the same values come back.
        let reopened = open_in(&dir);
        let patterns = reopened.get_known_patterns(None);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].pattern, "assertion_style:expect");
        let stats = reopened.stats();
        assert_eq!(stats.total_generated, 2);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn known_pattern_filter_matches_context_values() {
        let dir = tempfile::tempdir().unwrap();
        let memory = open_in(&dir);
        memory
            .add_known_pattern(
                "mocking_pattern:vi.mock",
                HashMap::from([("language".into(), serde_json::json!("typescript"))]),
            )
            .unwrap();
        memory
            .add_known_pattern(
                "mocking_pattern:pytest.fixture",
                HashMap::from([("language".into(), serde_json::json!("python"))]),
            )
            .unwrap();

        let ts = memory.get_known_patterns(Some("typescript"));
        assert_eq!(ts.len(), 1);
        assert_eq!(ts[0].pattern, "mocking_pattern:vi.mock");
    }

    #[test]
    fn failed_pattern_updates_reason_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let memory = open_in(&dir);
        memory.add_failed_pattern("flaky_test", "timeout on /login").unwrap();
        memory.add_failed_pattern("flaky_test", "timeout on /home").unwrap();

        let failed = memory.get_failed_patterns(None);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].reason, "timeout on /home");
    }

    #[test]
    fn failed_stats_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let memory = open_in(&dir);
        memory.update_stats(true, 3).unwrap();
        memory.update_stats(false, 1).unwrap();
        let stats = memory.stats();
        assert_eq!(stats.total_generated, 4);
        assert_eq!(stats.successful, 3);
        assert_eq!(stats.failed, 1);
        assert!(!stats.last_updated.is_empty());
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = memory_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        let memory = open_in(&dir);
        assert!(memory.get_known_patterns(None).is_empty());
    }
}
