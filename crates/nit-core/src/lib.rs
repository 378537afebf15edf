//! Core abstractions for the Nit-R agent runtime.
//!
//! Everything that more than one crate needs lives here: the `Agent`
//! trait and its task envelope, run-scoped cancellation, the persistent
//! project memory, and the drift baseline store.

pub mod agent;
pub mod baselines;
pub mod cancel;
pub mod errors;
pub mod memory;
pub mod state;

pub use agent::{Agent, TaskInput, TaskOutput, TaskStatus};
pub use baselines::{DriftBaseline, DriftBaselineStore};
pub use cancel::CancelToken;
pub use errors::MemoryError;
pub use memory::{FailedPattern, GlobalMemory, KnownPattern, MemoryStats};
