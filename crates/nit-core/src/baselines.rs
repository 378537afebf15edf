//! Drift baseline store.
//!
//! One JSON file per drift test under `.nit/drift-baselines/`, holding the
//! canonical output captured in baseline mode and, for semantic tests, its
//! embedding vector.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::MemoryError;
use crate::state::{atomic_write, baselines_dir};

/// Recorded baseline for one drift test id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftBaseline {
    pub test_id: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub captured_at: String,
}

/// Per-project baseline directory keyed by test id.
pub struct DriftBaselineStore {
    dir: PathBuf,
}

impl DriftBaselineStore {
    pub fn new(project_root: &Path) -> Self {
        Self {
            dir: baselines_dir(project_root),
        }
    }

    fn path_for(&self, test_id: &str) -> Result<PathBuf, MemoryError> {
        // Test ids become file names; reject anything that would escape
        // the baselines directory.
        if test_id.is_empty()
            || test_id.contains(['/', '\\'])
            || test_id.starts_with('.')
        {
            return Err(MemoryError::InvalidBaselineId(test_id.to_string()));
        }
        Ok(self.dir.join(format!("{test_id}.json")))
    }

    pub fn get_baseline(&self, test_id: &str) -> Result<Option<DriftBaseline>, MemoryError> {
        let path = self.path_for(test_id)?;
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub fn set_baseline(
        &self,
        test_id: &str,
        output: String,
        embedding: Option<Vec<f32>>,
        metadata: HashMap<String, String>,
    ) -> Result<(), MemoryError> {
        let baseline = DriftBaseline {
            test_id: test_id.to_string(),
            output,
            embedding,
            metadata,
            captured_at: Utc::now().to_rfc3339(),
        };
        let path = self.path_for(test_id)?;
        atomic_write(&path, &serde_json::to_string_pretty(&baseline)?)?;
        Ok(())
    }

    pub fn list_ids(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .flatten()
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = DriftBaselineStore::new(dir.path());
        store
            .set_baseline("greeting", "hello drift\n".into(), None, HashMap::new())
            .unwrap();

        let baseline = store.get_baseline("greeting").unwrap().unwrap();
        assert_eq!(baseline.output, "hello drift\n");
        assert!(baseline.embedding.is_none());
        assert_eq!(store.list_ids(), vec!["greeting".to_string()]);
    }

    #[test]
    fn overwrite_keeps_single_baseline_per_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = DriftBaselineStore::new(dir.path());
        store
            .set_baseline("t1", "first".into(), None, HashMap::new())
            .unwrap();
        store
            .set_baseline("t1", "second".into(), Some(vec![0.1, 0.2]), HashMap::new())
            .unwrap();

        let baseline = store.get_baseline("t1").unwrap().unwrap();
        assert_eq!(baseline.output, "second");
        assert_eq!(baseline.embedding.as_deref(), Some(&[0.1f32, 0.2][..]));
        assert_eq!(store.list_ids().len(), 1);
    }

    #[test]
    fn missing_baseline_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DriftBaselineStore::new(dir.path());
        assert!(store.get_baseline("absent").unwrap().is_none());
    }

    #[test]
    fn path_traversal_ids_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = DriftBaselineStore::new(dir.path());
        assert!(store
            .set_baseline("../evil", "x".into(), None, HashMap::new())
            .is_err());
    }
}
