//! testbed - a minimal test execution engine
//!
//! Register named [`TestUnit`]s and [`ResultObserver`]s with a
//! [`TestRunner`], pick an [`ExecutionStrategy`], and run:
//!
//! ```no_run
//! use std::sync::Arc;
//! use testbed::{LoggingObserver, TestRunner, TestUnit};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut runner = TestRunner::new();
//! runner.add_observer(Arc::new(LoggingObserver::new()));
//! runner
//!     .add_unit(TestUnit::new("addition", || {
//!         assert_eq!(1 + 1, 2);
//!         Ok(())
//!     }))
//!     .add_unit(TestUnit::new("lookup", || anyhow::bail!("not found")));
//!
//! let summary = runner.run().await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod executor;
pub mod http;
pub mod models;
pub mod observer;
pub mod output;
pub mod unit;
pub mod utils;

pub use config::{ConfigFile, EngineConfig, EnvConfig, StrategyConfig};
pub use executor::{
    CloudStrategy, ExecutionStrategy, LocalStrategy, ParallelStrategy, RemoteStrategy,
    ResultPolicy, RunnerError, RunnerState, StrategyError, TestRunner,
};
pub use http::{HttpTransport, RemoteTarget, RemoteTransport, TransportError};
pub use models::{AggregateResult, Failure, FailureKind, Outcome, RunSummary, UnitResult};
pub use observer::{
    DashboardObserver, LoggingObserver, ObserverError, ObserverId, ReportObserver,
    ResultObserver, RunEvent,
};
pub use output::{ReportFormat, ResultFormatter};
pub use unit::{ExecutionHook, TestUnit};
pub use utils::{init_logger, LogLevel};
