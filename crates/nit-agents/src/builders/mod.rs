//! Builder agents: they turn analysis into generated test code.

pub mod common;
pub mod contract;
pub mod e2e;
pub mod infra;
pub mod integration;
pub mod unit;

pub use common::{BuildResult, BuilderConfig};
pub use contract::ContractTestBuilder;
pub use e2e::E2eBuilder;
pub use infra::InfraBuilder;
pub use integration::IntegrationBuilder;
pub use unit::UnitBuilder;
