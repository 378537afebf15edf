//! Analyzer agents.

pub mod code;
pub mod contract;
pub mod coverage;
pub mod diff;
pub mod integration_deps;
pub mod pattern;
pub mod security;
pub mod security_patterns;
pub mod semantic_gap;

pub use code::{CodeAnalyzer, CodeMap, ComplexityMetrics, FunctionCall, SideEffect, SideEffectType};
pub use contract::{ContractAnalyzer, PactContract, PactInteraction};
pub use coverage::{CoverageAnalyzer, CoverageGapReport, FunctionGap, GapPriority};
pub use diff::{DiffAnalyzer, DiffReport};
pub use integration_deps::{IntegrationDepsAnalyzer, IntegrationDependency};
pub use pattern::{ConventionProfile, PatternAnalyzer};
pub use security::{SecurityAnalyzer, SecurityFinding, Severity, VulnerabilityType};
pub use semantic_gap::{GapCategory, SemanticGap, SemanticGapDetector};
