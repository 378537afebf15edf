//! Healer agents.

pub mod self_healing;

pub use self_healing::{
    DomSnapshot, FailureClassification, FailureType, HealingResult, SelfHealingEngine,
};
