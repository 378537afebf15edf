//! The adapter registry.
//!
//! All adapters are enumerated at construction; lookups are by name, and
//! detection across the registry resolves which frameworks a project
//! actually uses.

use std::path::Path;
use std::sync::Arc;

use crate::coverage::{CoveragePyAdapter, CoverletAdapter, GcovAdapter, GoCoverAdapter, LcovAdapter, LlvmCovAdapter};
use crate::e2e::{CypressAdapter, PlaywrightAdapter};
use crate::traits::{CoverageAdapter, TestAdapter};
use crate::unit::{
    CargoTestAdapter, Catch2Adapter, GoTestAdapter, GtestAdapter, JestAdapter, Junit5Adapter,
    KotestAdapter, PytestAdapter, VitestAdapter, XunitAdapter,
};

pub struct AdapterRegistry {
    test_adapters: Vec<Arc<dyn TestAdapter>>,
    coverage_adapters: Vec<Arc<dyn CoverageAdapter>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            test_adapters: vec![
                Arc::new(PytestAdapter),
                Arc::new(VitestAdapter),
                Arc::new(JestAdapter),
                Arc::new(PlaywrightAdapter),
                Arc::new(CypressAdapter),
                Arc::new(CargoTestAdapter),
                Arc::new(GoTestAdapter),
                Arc::new(Catch2Adapter),
                Arc::new(GtestAdapter),
                Arc::new(Junit5Adapter),
                Arc::new(XunitAdapter),
                Arc::new(KotestAdapter),
            ],
            coverage_adapters: vec![
                Arc::new(LcovAdapter),
                Arc::new(CoveragePyAdapter),
                Arc::new(GcovAdapter),
                Arc::new(CoverletAdapter),
                Arc::new(LlvmCovAdapter),
                Arc::new(GoCoverAdapter),
            ],
        }
    }

    pub fn get_test_adapter(&self, name: &str) -> Option<Arc<dyn TestAdapter>> {
        self.test_adapters.iter().find(|a| a.name() == name).cloned()
    }

    pub fn get_coverage_adapter(&self, name: &str) -> Option<Arc<dyn CoverageAdapter>> {
        self.coverage_adapters
            .iter()
            .find(|a| a.name() == name)
            .cloned()
    }

    pub fn list_test_adapters(&self) -> Vec<&'static str> {
        self.test_adapters.iter().map(|a| a.name()).collect()
    }

    pub fn list_coverage_adapters(&self) -> Vec<&'static str> {
        self.coverage_adapters.iter().map(|a| a.name()).collect()
    }

    /// Test adapters whose detection matches the project.
    pub fn detect_test_adapters(&self, root: &Path) -> Vec<Arc<dyn TestAdapter>> {
        self.test_adapters
            .iter()
            .filter(|a| a.detect(root))
            .cloned()
            .collect()
    }

    /// Coverage adapter for a language, preferring detected ones.
    pub fn coverage_adapter_for_language(
        &self,
        root: &Path,
        language: &str,
    ) -> Option<Arc<dyn CoverageAdapter>> {
        self.coverage_adapters
            .iter()
            .find(|a| a.language() == language && a.detect(root))
            .or_else(|| {
                self.coverage_adapters
                    .iter()
                    .find(|a| a.language() == language)
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_expected_adapters_registered() {
        let registry = AdapterRegistry::new();
        let names = registry.list_test_adapters();
        for expected in [
            "pytest",
            "vitest",
            "jest",
            "playwright",
            "cypress",
            "cargo-test",
            "go-test",
            "catch2",
            "gtest",
            "junit5",
            "xunit",
            "kotest",
        ] {
            assert!(names.contains(&expected), "missing adapter {expected}");
        }
        assert!(registry.get_test_adapter("vitest").is_some());
        assert!(registry.get_test_adapter("nope").is_none());
    }

    #[test]
    fn coverage_adapters_registered() {
        let registry = AdapterRegistry::new();
        let names = registry.list_coverage_adapters();
        for expected in ["lcov", "coverage-py", "gcov", "coverlet", "cargo-llvm-cov", "go-cover"] {
            assert!(names.contains(&expected), "missing coverage adapter {expected}");
        }
    }

    #[test]
    fn vitest_detection_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"devDependencies":{"vitest":"^1.0.0"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("vitest.config.ts"), "").unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(
            src.join("math.test.ts"),
            "import { test, expect } from 'vitest';\ntest('adds', () => { expect(1+1).toBe(2); });\n",
        )
        .unwrap();

        let registry = AdapterRegistry::new();
        let adapter = registry.get_test_adapter("vitest").unwrap();
        assert!(adapter.detect(dir.path()));

        let detected = registry.detect_test_adapters(dir.path());
        assert!(detected.iter().any(|a| a.name() == "vitest"));
    }
}
