//! Execution strategy seam
//!
//! A strategy decides where and how a batch of units runs. The runner hands
//! it a [`Batch`]; the strategy executes the units however it likes and
//! reports each finished unit back through [`Batch::complete`], which records
//! the outcome on the unit and forwards it to the runner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::http::TransportError;
use crate::models::Verdict;
use crate::unit::{ExecutionHook, TestUnit, UnitJob};

/// Runner-level failures raised by a strategy
///
/// Unlike per-unit failures these abort the remaining batch.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("remote executor at {endpoint} unreachable: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    #[error("strategy misconfigured: {0}")]
    Config(String),
}

/// Where and how a batch of units executes
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    /// Short name used in logs and summaries
    fn name(&self) -> &str;

    /// Execute the batch, completing every unit that actually ran.
    ///
    /// Units left uncompleted (cancellation, transport failure) stay
    /// pending. Per-unit failures are never returned as errors.
    async fn execute(&self, batch: &mut Batch<'_>) -> Result<(), StrategyError>;
}

/// Timing and verdict of one execution attempt
#[derive(Clone, Debug)]
pub struct Completion {
    pub verdict: Verdict,
    pub duration: Duration,
    pub started_at: DateTime<Utc>,
}

/// Receives units as they finish; implemented by the runner
pub(crate) trait CompletionSink: Send + Sync {
    fn unit_finished(&mut self, index: usize, unit: &TestUnit);
}

/// The units of one run plus everything a strategy needs to execute them
pub struct Batch<'a> {
    units: &'a mut [TestUnit],
    hooks: &'a [ExecutionHook],
    unit_timeout: Option<Duration>,
    cancel: &'a CancellationToken,
    sink: &'a mut dyn CompletionSink,
    completed: Vec<bool>,
}

impl<'a> Batch<'a> {
    pub(crate) fn new(
        units: &'a mut [TestUnit],
        hooks: &'a [ExecutionHook],
        unit_timeout: Option<Duration>,
        cancel: &'a CancellationToken,
        sink: &'a mut dyn CompletionSink,
    ) -> Self {
        let completed = vec![false; units.len()];
        Self {
            units,
            hooks,
            unit_timeout,
            cancel,
            sink,
            completed,
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn unit(&self, index: usize) -> &TestUnit {
        &self.units[index]
    }

    pub fn units(&self) -> &[TestUnit] {
        self.units
    }

    /// The unit's action wrapped in runner hooks and its own hooks
    pub fn job(&self, index: usize) -> UnitJob {
        self.units[index].job(self.hooks)
    }

    /// Per-unit time budget, if any
    pub fn unit_timeout(&self) -> Option<Duration> {
        self.unit_timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        self.cancel
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.completed[index]
    }

    /// Record a finished unit and report it to the runner.
    ///
    /// A unit is completed at most once per batch; repeats are ignored.
    pub fn complete(&mut self, index: usize, completion: Completion) {
        if self.completed[index] {
            warn!(
                "Unit {} completed twice in one batch, ignoring",
                self.units[index].name()
            );
            return;
        }
        self.completed[index] = true;

        let unit = &mut self.units[index];
        unit.record(completion.verdict, completion.duration, completion.started_at);
        self.sink.unit_finished(index, unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Failure, Outcome};

    #[derive(Default)]
    struct Collect(Vec<(usize, Outcome)>);

    impl CompletionSink for Collect {
        fn unit_finished(&mut self, index: usize, unit: &TestUnit) {
            self.0.push((index, unit.outcome().clone()));
        }
    }

    fn completion(verdict: Verdict) -> Completion {
        Completion {
            verdict,
            duration: Duration::from_millis(1),
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_complete_records_and_forwards() {
        let mut units = vec![
            TestUnit::new("A", || Ok(())),
            TestUnit::new("B", || Ok(())),
        ];
        let cancel = CancellationToken::new();
        let mut sink = Collect::default();

        {
            let mut batch = Batch::new(&mut units, &[], None, &cancel, &mut sink);
            assert_eq!(batch.len(), 2);
            batch.complete(1, completion(Err(Failure::fault("boom"))));
            batch.complete(1, completion(Ok(())));
            assert!(batch.is_completed(1));
            assert!(!batch.is_completed(0));
        }

        assert_eq!(sink.0, vec![(1, Outcome::Failed("boom".to_string()))]);
        assert_eq!(units[1].outcome(), &Outcome::Failed("boom".to_string()));
        assert!(units[0].outcome().is_pending());
    }
}
