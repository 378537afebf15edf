//! The bug-fix chain: detect → root cause → fix → verify.

pub mod bug_detect;
pub mod fix_gen;
pub mod fix_verify;
pub mod root_cause;

pub use bug_detect::{BugDetector, BugReport};
pub use fix_gen::{FixGenerator, GeneratedFix};
pub use fix_verify::{restore_pending_fixes, FixVerifier, VerificationReport};
pub use root_cause::{RootCause, RootCauseAnalyzer};
