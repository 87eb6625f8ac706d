//! Test execution engine
//!
//! The runner plus the strategies deciding where a batch of units runs:
//! sequentially in-process, on a bounded worker pool, on one remote
//! executor, or sharded across a fleet.

mod cloud;
mod local;
mod parallel;
mod remote;
mod runner;
mod strategy;

pub use cloud::CloudStrategy;
pub use local::{run_bounded, run_inline, run_on_worker, LocalStrategy};
pub use parallel::ParallelStrategy;
pub use remote::{RemoteStrategy, MISSING_RESULT_MESSAGE};
pub use runner::{ResultPolicy, RunnerError, RunnerState, TestRunner};
pub use strategy::{Batch, Completion, ExecutionStrategy, StrategyError};
