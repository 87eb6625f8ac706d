//! In-process execution
//!
//! Units run one after another in registration order. Without a per-unit
//! timeout a unit runs inline in the calling task. With a timeout it runs on
//! a dedicated worker thread and is awaited for at most that long; a worker
//! that overruns is abandoned, since a thread cannot be killed, and the unit
//! is failed with `"timeout"`.

use async_trait::async_trait;
use chrono::Utc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::strategy::{Batch, Completion, ExecutionStrategy, StrategyError};
use crate::models::{Failure, Verdict};
use crate::unit::UnitJob;
use crate::utils::Timer;

/// Sequential in-process strategy
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStrategy;

impl LocalStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExecutionStrategy for LocalStrategy {
    fn name(&self) -> &str {
        "local"
    }

    async fn execute(&self, batch: &mut Batch<'_>) -> Result<(), StrategyError> {
        for index in 0..batch.len() {
            if batch.is_cancelled() {
                debug!("Cancelled before {}", batch.unit(index).name());
                break;
            }

            let job = batch.job(index);
            let completion = run_bounded(job, batch.unit_timeout()).await;
            batch.complete(index, completion);
        }

        Ok(())
    }
}

/// Run a job inline, or on a worker thread when a timeout applies
pub async fn run_bounded(job: UnitJob, timeout: Option<Duration>) -> Completion {
    match timeout {
        Some(_) => run_on_worker(job, timeout).await,
        None => run_inline(&job),
    }
}

/// Run a job to completion in the calling thread
pub fn run_inline(job: &UnitJob) -> Completion {
    let started_at = Utc::now();
    let timer = Timer::start(job.name());
    let verdict = job.run();

    Completion {
        verdict,
        duration: timer.stop(),
        started_at,
    }
}

/// Run a job on its own thread, waiting at most `timeout` for it
pub async fn run_on_worker(job: UnitJob, timeout: Option<Duration>) -> Completion {
    let started_at = Utc::now();
    let timer = Timer::start(job.name());
    let name = job.name().to_string();
    let (tx, rx) = oneshot::channel();

    let spawned = thread::Builder::new()
        .name("testbed-unit".to_string())
        .spawn(move || {
            let _ = tx.send(job.run());
        });

    let verdict = match spawned {
        Err(e) => Err(Failure::fault(format!("failed to start worker thread: {e}"))),
        Ok(_detached) => match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => worker_verdict(received),
                Err(_) => {
                    warn!("{} timed out after {}ms", name, limit.as_millis());
                    Err(Failure::timeout())
                }
            },
            None => worker_verdict(rx.await),
        },
    };

    Completion {
        verdict,
        duration: timer.stop(),
        started_at,
    }
}

fn worker_verdict(received: Result<Verdict, oneshot::error::RecvError>) -> Verdict {
    received.unwrap_or_else(|_| Err(Failure::fault("worker exited without reporting")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureKind;
    use crate::unit::TestUnit;

    #[tokio::test]
    async fn test_run_bounded_inline_pass() {
        let unit = TestUnit::new("quick", || Ok(()));
        let completion = run_bounded(unit.job(&[]), None).await;
        assert!(completion.verdict.is_ok());
    }

    #[tokio::test]
    async fn test_run_on_worker_captures_panic() {
        let unit = TestUnit::new("panics", || panic!("kaboom"));
        let completion = run_on_worker(unit.job(&[]), Some(Duration::from_secs(5))).await;
        let failure = completion.verdict.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Assertion);
        assert_eq!(failure.message, "kaboom");
    }

    #[tokio::test]
    async fn test_run_on_worker_times_out() {
        let unit = TestUnit::new("hangs", || {
            thread::sleep(Duration::from_secs(2));
            Ok(())
        });
        let completion = run_on_worker(unit.job(&[]), Some(Duration::from_millis(50))).await;
        assert_eq!(completion.verdict, Err(Failure::timeout()));
        assert!(completion.duration >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_run_on_worker_without_timeout_waits() {
        let unit = TestUnit::new("slowish", || {
            thread::sleep(Duration::from_millis(20));
            Ok(())
        });
        let completion = run_on_worker(unit.job(&[]), None).await;
        assert!(completion.verdict.is_ok());
        assert!(completion.duration >= Duration::from_millis(20));
    }
}
