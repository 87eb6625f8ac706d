//! Test execution runner
//!
//! Owns the registered units, hooks and observers, hands each run to the
//! active strategy, and turns finished units into results and events.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::local::LocalStrategy;
use super::strategy::{Batch, CompletionSink, ExecutionStrategy, StrategyError};
use crate::config::EngineConfig;
use crate::models::{RunSummary, UnitResult};
use crate::observer::{ObserverId, ObserverRegistry, ResultObserver, RunEvent};
use crate::unit::{ExecutionHook, TestUnit};
use crate::utils::Timer;

/// What happens to `results` when a new run starts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultPolicy {
    /// `results` only ever holds the latest run
    #[default]
    ResetPerRun,
    /// Every run appends to `results`
    Accumulate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
}

/// Runner-level failures
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The batch could not finish; `partial` holds what did run
    #[error("run aborted: {source}")]
    Strategy {
        #[source]
        source: StrategyError,
        partial: Box<RunSummary>,
    },
}

impl RunnerError {
    /// Summary of the units that completed before the failure
    pub fn partial(&self) -> &RunSummary {
        match self {
            RunnerError::Strategy { partial, .. } => partial,
        }
    }
}

/// Test runner
pub struct TestRunner {
    units: Vec<TestUnit>,
    hooks: Vec<ExecutionHook>,
    observers: ObserverRegistry,
    strategy: Arc<dyn ExecutionStrategy>,
    unit_timeout: Option<Duration>,
    result_policy: ResultPolicy,
    results: Vec<UnitResult>,
    state: RunnerState,
    runs: u32,
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRunner {
    /// Runner with the local strategy and no timeout
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            hooks: Vec::new(),
            observers: ObserverRegistry::new(),
            strategy: Arc::new(LocalStrategy::new()),
            unit_timeout: None,
            result_policy: ResultPolicy::default(),
            results: Vec::new(),
            state: RunnerState::Idle,
            runs: 0,
        }
    }

    /// Runner configured from engine settings.
    ///
    /// `log_level` is not applied here; call [`EngineConfig::init_logging`].
    pub fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let mut runner = Self::new().with_result_policy(config.result_policy);
        runner.strategy = config.strategy.build()?;
        runner.unit_timeout = config.unit_timeout();
        Ok(runner)
    }

    pub fn with_strategy<S: ExecutionStrategy + 'static>(mut self, strategy: S) -> Self {
        self.set_strategy(strategy);
        self
    }

    pub fn with_unit_timeout(mut self, timeout: Duration) -> Self {
        self.unit_timeout = Some(timeout);
        self
    }

    pub fn with_result_policy(mut self, policy: ResultPolicy) -> Self {
        self.result_policy = policy;
        self
    }

    /// Swap the strategy used by subsequent runs
    pub fn set_strategy<S: ExecutionStrategy + 'static>(&mut self, strategy: S) {
        self.set_shared_strategy(Arc::new(strategy));
    }

    pub fn set_shared_strategy(&mut self, strategy: Arc<dyn ExecutionStrategy>) {
        debug!("Strategy set to {}", strategy.name());
        self.strategy = strategy;
    }

    pub fn set_unit_timeout(&mut self, timeout: Option<Duration>) {
        self.unit_timeout = timeout;
    }

    /// Register a unit; registration order is execution and report order
    pub fn add_unit(&mut self, unit: TestUnit) -> &mut Self {
        self.units.push(unit);
        self
    }

    pub fn add_units(&mut self, units: impl IntoIterator<Item = TestUnit>) -> &mut Self {
        self.units.extend(units);
        self
    }

    /// Register a hook wrapping every unit of every run
    pub fn add_hook(&mut self, hook: ExecutionHook) -> &mut Self {
        self.hooks.push(hook);
        self
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ResultObserver>) -> ObserverId {
        self.observers.register(observer)
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    pub fn units(&self) -> &[TestUnit] {
        &self.units
    }

    /// Results per the configured [`ResultPolicy`], in registration order per run
    pub fn results(&self) -> &[UnitResult] {
        &self.results
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn unit_timeout(&self) -> Option<Duration> {
        self.unit_timeout
    }

    pub fn result_policy(&self) -> ResultPolicy {
        self.result_policy
    }

    /// Number of runs started so far
    pub fn runs(&self) -> u32 {
        self.runs
    }

    pub async fn run(&mut self) -> Result<RunSummary, RunnerError> {
        self.run_with_cancel(CancellationToken::new()).await
    }

    /// Run every registered unit once.
    ///
    /// Cancelling `cancel` stops scheduling further units; units already in
    /// flight finish and `batch_completed` still fires.
    pub async fn run_with_cancel(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<RunSummary, RunnerError> {
        let Self {
            units,
            hooks,
            observers,
            strategy,
            unit_timeout,
            result_policy,
            results,
            state,
            runs,
        } = self;

        let _running = RunningGuard::enter(state);
        *runs += 1;
        let run = *runs;

        if *result_policy == ResultPolicy::ResetPerRun {
            results.clear();
        }
        for unit in units.iter_mut() {
            unit.reset();
        }

        info!(
            "Starting run {} with {} units ({} strategy)",
            run,
            units.len(),
            strategy.name()
        );

        let started_at = Utc::now();
        let timer = Timer::start(format!("run {run}"));
        let mut recorder = RunRecorder::new(observers, units.len());

        let executed = {
            let mut batch = Batch::new(
                units.as_mut_slice(),
                hooks.as_slice(),
                *unit_timeout,
                &cancel,
                &mut recorder,
            );
            strategy.execute(&mut batch).await
        };

        let mut run_results = recorder.into_results();
        run_results.sort_by_key(|r| r.index);

        let completed: HashSet<usize> = run_results.iter().map(|r| r.index).collect();
        let skipped = units
            .iter()
            .enumerate()
            .filter(|(index, _)| !completed.contains(index))
            .map(|(_, unit)| unit.name().to_string())
            .collect();

        let summary = RunSummary::new(run, strategy.name(), units.len(), run_results)
            .with_started_at(started_at)
            .with_wall_time(timer.stop())
            .with_cancelled(cancel.is_cancelled())
            .with_skipped(skipped);

        observers.notify_all(&RunEvent::BatchCompleted(&summary));
        results.extend(summary.results.iter().cloned());

        info!(
            "Run {} completed in {}ms - Pass: {}/{} ({:.1}%)",
            run,
            summary.wall_time.as_millis(),
            summary.passed,
            summary.total,
            summary.pass_rate()
        );

        match executed {
            Ok(()) => Ok(summary),
            Err(source) => {
                error!("Run {} aborted: {}", run, source);
                Err(RunnerError::Strategy {
                    source,
                    partial: Box::new(summary),
                })
            }
        }
    }

    /// Run the units `rounds` times, stopping at the first aborted run
    pub async fn run_rounds(&mut self, rounds: u32) -> Result<Vec<RunSummary>, RunnerError> {
        info!("Running {} rounds of {} units", rounds, self.units.len());

        let mut summaries = Vec::with_capacity(rounds as usize);
        for round in 1..=rounds {
            info!("=== Round {}/{} ===", round, rounds);
            summaries.push(self.run().await?);
        }
        Ok(summaries)
    }
}

/// Restores `Idle` when a run ends, including when its future is dropped
struct RunningGuard<'a>(&'a mut RunnerState);

impl<'a> RunningGuard<'a> {
    fn enter(state: &'a mut RunnerState) -> Self {
        *state = RunnerState::Running;
        Self(state)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        *self.0 = RunnerState::Idle;
    }
}

/// Collects results and fans out unit events as a strategy completes units
struct RunRecorder<'a> {
    observers: &'a ObserverRegistry,
    results: Vec<UnitResult>,
}

impl<'a> RunRecorder<'a> {
    fn new(observers: &'a ObserverRegistry, capacity: usize) -> Self {
        Self {
            observers,
            results: Vec::with_capacity(capacity),
        }
    }

    fn into_results(self) -> Vec<UnitResult> {
        self.results
    }
}

impl CompletionSink for RunRecorder<'_> {
    fn unit_finished(&mut self, index: usize, unit: &TestUnit) {
        debug!("{} {}", unit.outcome().symbol(), unit.name());

        self.results.push(UnitResult {
            index,
            name: unit.name().to_string(),
            outcome: unit.outcome().clone(),
            failure_kind: unit.failure_kind(),
            duration: unit.duration().unwrap_or_default(),
            started_at: unit.started_at().unwrap_or_else(Utc::now),
        });

        self.observers.notify_all(&RunEvent::UnitCompleted(unit));
        if unit.outcome().is_failed() {
            self.observers.notify_all(&RunEvent::UnitFailed(unit));
        }
    }
}
