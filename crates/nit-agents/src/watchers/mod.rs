//! Watcher agents.

pub mod comparator;
pub mod drift;
pub mod executor;

pub use comparator::{ComparisonOutcome, ComparisonType, SemanticComparator};
pub use drift::{DriftReport, DriftTestOutcome, DriftWatcher, WatchMode};
pub use executor::{DriftTestSpec, EndpointType};
