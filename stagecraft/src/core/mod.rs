//! Core result and report types.
//!
//! These are the immutable values exchanged between the runner, the
//! controller, and the CLI: stage statuses, classified results, and the
//! per-invocation run report.

mod report;
mod status;

pub use report::RunReport;
pub use status::{ResultCause, StageResult, StageState, StageStatus};
