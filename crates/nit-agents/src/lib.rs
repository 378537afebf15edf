//! The agent fleet: detectors, analyzers, builders, debuggers, healers,
//! watchers, and reporters, plus the orchestrator that composes them.

pub mod analyzers;
pub mod builders;
pub mod debuggers;
pub mod detectors;
pub mod healers;
pub mod orchestrator;
pub mod platform;
pub mod reporters;
pub mod watchers;

pub use orchestrator::{Orchestrator, RunContext, RunSummary};
