//! Coverage adapters and report parsers.

mod coverlet;
mod coverage_py;
mod go_cover;
mod lcov;

pub use coverage_py::CoveragePyAdapter;
pub use coverlet::CoverletAdapter;
pub use go_cover::GoCoverAdapter;
pub use lcov::{parse_lcov, GcovAdapter, LcovAdapter, LlvmCovAdapter};
