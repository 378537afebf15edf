//! Detector agents: stack, framework, dependency, infrastructure, and
//! LLM usage.

pub mod dependency;
pub mod framework;
pub mod infra;
pub mod llm_usage;
pub mod signals;
pub mod stack;

pub use dependency::DependencyDetector;
pub use framework::{detect_frameworks, needs_llm_fallback, FrameworkDetector};
pub use infra::InfraDetector;
pub use llm_usage::LlmUsageDetector;
pub use signals::{
    DetectedFramework, DetectionThresholds, FrameworkCategory, FrameworkProfile, FrameworkRule,
    Signal,
};
pub use stack::StackDetector;

/// Directories skipped by every project scan.
pub(crate) const SKIP_DIRS: [&str; 17] = [
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
    "node_modules",
    ".venv",
    "venv",
    ".tox",
    ".nox",
    ".mypy_cache",
    ".ruff_cache",
    ".pytest_cache",
    "dist",
    "build",
    ".nit",
    ".next",
    "target",
];

pub(crate) fn is_skipped_dir(name: &str) -> bool {
    SKIP_DIRS.contains(&name) || name == "vendor"
}
