//! Parallel in-process execution
//!
//! Runs independent units on a bounded pool of worker threads. Each unit's
//! outcome is written only by the strategy task once its worker reports, so
//! notifications for one unit are never interleaved with another's.
//!
//! A unit's permit is released when its timeout fires, not when its worker
//! thread exits. Abandoned workers of hanging units therefore keep running
//! next to the pool, so more than `max_concurrent` threads can be alive.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::local::run_on_worker;
use super::strategy::{Batch, ExecutionStrategy, StrategyError};

/// Bounded concurrent in-process strategy
#[derive(Clone, Debug)]
pub struct ParallelStrategy {
    max_concurrent: usize,
}

impl ParallelStrategy {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

impl Default for ParallelStrategy {
    fn default() -> Self {
        Self::new(4)
    }
}

#[async_trait]
impl ExecutionStrategy for ParallelStrategy {
    fn name(&self) -> &str {
        "parallel"
    }

    async fn execute(&self, batch: &mut Batch<'_>) -> Result<(), StrategyError> {
        info!(
            "Running {} units in parallel (max {} concurrent)",
            batch.len(),
            self.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let timeout = batch.unit_timeout();
        let mut in_flight = FuturesUnordered::new();

        for index in 0..batch.len() {
            let job = batch.job(index);
            let semaphore = Arc::clone(&semaphore);
            let cancel = batch.cancellation().clone();

            in_flight.push(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                if cancel.is_cancelled() {
                    debug!("Cancelled before {}", job.name());
                    return None;
                }
                Some((index, run_on_worker(job, timeout).await))
            });
        }

        while let Some(finished) = in_flight.next().await {
            if let Some((index, completion)) = finished {
                batch.complete(index, completion);
            }
        }

        Ok(())
    }
}
