//! Unit-test framework adapters.

mod cpp;
mod jest;
mod jvm;
mod pytest;
mod vitest;
mod xunit;

pub use cargo_test::CargoTestAdapter;
pub use cpp::{Catch2Adapter, GtestAdapter};
pub use go_test::GoTestAdapter;
pub use jest::JestAdapter;
pub use jvm::{Junit5Adapter, KotestAdapter};
pub use pytest::PytestAdapter;
pub use vitest::VitestAdapter;
pub use xunit::XunitAdapter;
