//! Test units
//!
//! A [`TestUnit`] is a named, executable check. Executing it never panics and
//! never returns an error: whatever the action does, the result is captured
//! in the unit's [`Outcome`] so a runner can always finish its batch.
//!
//! Inside an action, a returned `Err` counts as an unexpected fault and a
//! panic (the usual `assert!` family) counts as an assertion failure. Both
//! are reported as [`Outcome::Failed`].

mod hooks;

pub use hooks::{ExecutionHook, HookFn};

pub(crate) use hooks::panic_message;

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{FailureKind, Outcome, Verdict};
use crate::utils::Timer;
use hooks::guarded;

/// Zero-argument test logic
pub type TestAction = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// A named, executable unit of test logic with its last outcome and timing
///
/// Cloning a unit shares its action but copies its recorded state, so a
/// clone registered twice with a runner executes and reports twice.
#[derive(Clone)]
pub struct TestUnit {
    name: String,
    action: TestAction,
    hooks: Vec<ExecutionHook>,
    outcome: Outcome,
    failure_kind: Option<FailureKind>,
    duration: Option<Duration>,
    started_at: Option<DateTime<Utc>>,
}

impl TestUnit {
    /// Create a new pending unit
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            action: Arc::new(action),
            hooks: Vec::new(),
            outcome: Outcome::Pending,
            failure_kind: None,
            duration: None,
            started_at: None,
        }
    }

    /// Build one unit per data row, named `{prefix}[{row}]`
    pub fn parameterized<T, I, F>(prefix: &str, rows: I, test: F) -> Vec<TestUnit>
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display + Send + Sync + 'static,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let test = Arc::new(test);
        rows.into_iter()
            .map(|row| {
                let name = format!("{prefix}[{row}]");
                let test = Arc::clone(&test);
                TestUnit::new(name, move || test(&row))
            })
            .collect()
    }

    /// Attach a hook that wraps only this unit
    pub fn with_hook(mut self, hook: ExecutionHook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure_kind
    }

    /// Elapsed time of the last execution, `None` until executed
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn hooks(&self) -> &[ExecutionHook] {
        &self.hooks
    }

    /// Execute the action in the calling thread and record the outcome
    pub fn execute(&mut self) -> &Outcome {
        let job = self.job(&[]);
        let started_at = Utc::now();
        let timer = Timer::start(&self.name);
        let verdict = job.run();
        self.record(verdict, timer.stop(), started_at);
        &self.outcome
    }

    /// Detach everything needed to execute this unit elsewhere.
    ///
    /// `outer` hooks wrap the unit's own hooks.
    pub fn job(&self, outer: &[ExecutionHook]) -> UnitJob {
        let mut hooks = Vec::with_capacity(outer.len() + self.hooks.len());
        hooks.extend_from_slice(outer);
        hooks.extend_from_slice(&self.hooks);

        UnitJob {
            name: self.name.clone(),
            action: Arc::clone(&self.action),
            hooks,
        }
    }

    /// Overwrite outcome and duration with a fresh execution result
    pub(crate) fn record(
        &mut self,
        verdict: Verdict,
        duration: Duration,
        started_at: DateTime<Utc>,
    ) {
        match verdict {
            Ok(()) => {
                self.outcome = Outcome::Passed;
                self.failure_kind = None;
            }
            Err(failure) => {
                self.outcome = Outcome::Failed(failure.message);
                self.failure_kind = Some(failure.kind);
            }
        }
        self.duration = Some(duration);
        self.started_at = Some(started_at);
    }

    /// Forget the last execution
    pub(crate) fn reset(&mut self) {
        self.outcome = Outcome::Pending;
        self.failure_kind = None;
        self.duration = None;
        self.started_at = None;
    }
}

impl fmt::Debug for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestUnit")
            .field("name", &self.name)
            .field("hooks", &self.hooks)
            .field("outcome", &self.outcome)
            .field("duration", &self.duration)
            .finish()
    }
}

/// A unit's action plus the hooks that wrap it, detached from the unit so it
/// can run on another thread
#[derive(Clone)]
pub struct UnitJob {
    name: String,
    action: TestAction,
    hooks: Vec<ExecutionHook>,
}

impl UnitJob {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run hooks and action, capturing every failure
    pub fn run(&self) -> Verdict {
        let mut entered = 0;
        let mut verdict = Ok(());

        for hook in &self.hooks {
            match hook.run_before(&self.name) {
                Ok(()) => entered += 1,
                Err(failure) => {
                    verdict = Err(failure);
                    break;
                }
            }
        }

        if verdict.is_ok() {
            verdict = guarded(|| (self.action)());
        }

        for hook in self.hooks[..entered].iter().rev() {
            if let Err(failure) = hook.run_after(&self.name) {
                if verdict.is_ok() {
                    verdict = Err(failure);
                }
            }
        }

        verdict
    }
}
