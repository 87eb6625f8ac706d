//! Remote execution
//!
//! Sends the batch description to a remote executor and maps the returned
//! results back onto the units, by position first and by name otherwise.
//! Hooks are an in-process concern and do not travel.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::strategy::{Batch, Completion, ExecutionStrategy, StrategyError};
use crate::http::{
    HttpTransport, RemoteRunRequest, RemoteRunResponse, RemoteStatus, RemoteTarget,
    RemoteTransport, RemoteUnitResult, UnitDescriptor,
};
use crate::models::{generate_run_id, Failure, FailureKind, TIMEOUT_MESSAGE};

/// Recorded for units the remote executor did not report on
pub const MISSING_RESULT_MESSAGE: &str = "no result returned by remote executor";

/// Strategy that runs the whole batch on one remote executor
pub struct RemoteStrategy {
    target: RemoteTarget,
    transport: Arc<dyn RemoteTransport>,
}

impl RemoteStrategy {
    /// Remote strategy over HTTP
    pub fn new(target: RemoteTarget) -> Result<Self> {
        Ok(Self::with_transport(target, Arc::new(HttpTransport::new()?)))
    }

    pub fn with_transport(target: RemoteTarget, transport: Arc<dyn RemoteTransport>) -> Self {
        Self { target, transport }
    }

    pub fn target(&self) -> &RemoteTarget {
        &self.target
    }
}

#[async_trait]
impl ExecutionStrategy for RemoteStrategy {
    fn name(&self) -> &str {
        "remote"
    }

    async fn execute(&self, batch: &mut Batch<'_>) -> Result<(), StrategyError> {
        if batch.is_empty() || batch.is_cancelled() {
            return Ok(());
        }

        let shard: Vec<usize> = (0..batch.len()).collect();
        let request = shard_request(batch, &shard);

        info!(
            "Dispatching {} units to {}",
            shard.len(),
            self.target.endpoint
        );

        let started_at = Utc::now();
        let response = self
            .transport
            .dispatch(&self.target, &request)
            .await
            .map_err(|source| {
                error!("Remote executor {} failed: {}", self.target.endpoint, source);
                StrategyError::Transport {
                    endpoint: self.target.endpoint.clone(),
                    source,
                }
            })?;

        apply_response(batch, &shard, response, started_at);
        Ok(())
    }
}

/// Describe the units at `shard` positions for a remote executor
pub(crate) fn shard_request(batch: &Batch<'_>, shard: &[usize]) -> RemoteRunRequest {
    RemoteRunRequest {
        run_id: generate_run_id(),
        units: shard
            .iter()
            .map(|&index| UnitDescriptor {
                index,
                name: batch.unit(index).name().to_string(),
            })
            .collect(),
        timeout_ms: batch.unit_timeout().map(|t| t.as_millis() as u64),
    }
}

/// Complete every unit of `shard` from a remote response
pub(crate) fn apply_response(
    batch: &mut Batch<'_>,
    shard: &[usize],
    response: RemoteRunResponse,
    started_at: DateTime<Utc>,
) {
    let mut matched: Vec<Option<RemoteUnitResult>> = vec![None; shard.len()];

    for result in response.results {
        let free = |pos: usize, matched: &[Option<RemoteUnitResult>]| {
            matched[pos].is_none() && batch.unit(shard[pos]).name() == result.name
        };
        let by_index = result
            .index
            .and_then(|i| shard.iter().position(|&s| s == i))
            .filter(|&pos| free(pos, &matched));
        let slot = by_index.or_else(|| (0..shard.len()).find(|&pos| free(pos, &matched)));

        match slot {
            Some(pos) => matched[pos] = Some(result),
            None => warn!("Ignoring remote result for unknown unit {}", result.name),
        }
    }

    for (pos, &index) in shard.iter().enumerate() {
        let completion = match matched[pos].take() {
            Some(result) => remote_completion(result, started_at),
            None => Completion {
                verdict: Err(Failure::fault(MISSING_RESULT_MESSAGE)),
                duration: Duration::ZERO,
                started_at,
            },
        };
        batch.complete(index, completion);
    }
}

fn remote_completion(result: RemoteUnitResult, started_at: DateTime<Utc>) -> Completion {
    let nanos = (result.duration_ms.max(0.0) * 1_000_000.0).round() as u64;
    let duration = Duration::from_nanos(nanos);

    let verdict = match result.status {
        RemoteStatus::Passed => Ok(()),
        RemoteStatus::Failed => {
            let message = result.message.unwrap_or_default();
            let kind = result.kind.unwrap_or(if message == TIMEOUT_MESSAGE {
                FailureKind::Timeout
            } else {
                FailureKind::Fault
            });
            Err(Failure::new(kind, message))
        }
    };

    Completion {
        verdict,
        duration,
        started_at,
    }
}
