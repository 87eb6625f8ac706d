//! Data models for test execution
//!
//! Outcomes, per-unit results and run summaries shared by the runner,
//! the strategies and the observers.

mod aggregate;
mod outcome;
mod summary;

pub use aggregate::{AggregateResult, UnitStats};
pub use outcome::{Failure, FailureKind, Outcome, Verdict, TIMEOUT_MESSAGE};
pub use summary::{RunSummary, UnitResult};

pub(crate) use summary::generate_run_id;
