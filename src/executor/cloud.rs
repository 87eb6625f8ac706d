//! Distributed execution across a fleet of remote executors
//!
//! Same contract as [`RemoteStrategy`](super::RemoteStrategy), but the batch
//! is sharded round-robin over several nodes and the shards are dispatched
//! concurrently. Shards that answer are applied even when another node
//! fails; the first transport failure is then returned.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info};

use super::remote::{apply_response, shard_request};
use super::strategy::{Batch, ExecutionStrategy, StrategyError};
use crate::http::{HttpTransport, RemoteTarget, RemoteTransport};

/// Strategy that spreads a batch over a managed execution fleet
pub struct CloudStrategy {
    nodes: Vec<RemoteTarget>,
    transport: Arc<dyn RemoteTransport>,
}

impl CloudStrategy {
    /// Cloud strategy over HTTP
    pub fn new(nodes: Vec<RemoteTarget>) -> Result<Self> {
        if nodes.is_empty() {
            bail!("Cloud strategy needs at least one node");
        }
        Ok(Self::with_transport(nodes, Arc::new(HttpTransport::new()?)))
    }

    pub fn with_transport(nodes: Vec<RemoteTarget>, transport: Arc<dyn RemoteTransport>) -> Self {
        Self { nodes, transport }
    }

    pub fn nodes(&self) -> &[RemoteTarget] {
        &self.nodes
    }

    /// Unit positions per node, round-robin by registration index
    fn shards(&self, len: usize) -> Vec<Vec<usize>> {
        let mut shards = vec![Vec::new(); self.nodes.len()];
        for index in 0..len {
            shards[index % self.nodes.len()].push(index);
        }
        shards
    }
}

#[async_trait]
impl ExecutionStrategy for CloudStrategy {
    fn name(&self) -> &str {
        "cloud"
    }

    async fn execute(&self, batch: &mut Batch<'_>) -> Result<(), StrategyError> {
        if batch.is_empty() || batch.is_cancelled() {
            return Ok(());
        }
        if self.nodes.is_empty() {
            return Err(StrategyError::Config(
                "cloud strategy has no nodes".to_string(),
            ));
        }

        let dispatches: Vec<_> = self
            .shards(batch.len())
            .into_iter()
            .enumerate()
            .filter(|(_, shard)| !shard.is_empty())
            .map(|(node, shard)| {
                let request = shard_request(batch, &shard);
                (node, shard, request)
            })
            .collect();

        info!(
            "Dispatching {} units across {} nodes",
            batch.len(),
            dispatches.len()
        );

        let started_at = Utc::now();
        let responses = join_all(
            dispatches
                .iter()
                .map(|(node, _, request)| self.transport.dispatch(&self.nodes[*node], request)),
        )
        .await;

        let mut first_error = None;
        for ((node, shard, _), response) in dispatches.iter().zip(responses) {
            let endpoint = &self.nodes[*node].endpoint;
            match response {
                Ok(response) => apply_response(batch, shard, response, started_at),
                Err(source) => {
                    error!("Node {} failed: {}", endpoint, source);
                    if first_error.is_none() {
                        first_error = Some(StrategyError::Transport {
                            endpoint: endpoint.clone(),
                            source,
                        });
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::remote::mock::MockTransport;
    use crate::executor::strategy::CompletionSink;
    use crate::unit::TestUnit;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Collect(Vec<usize>);

    impl CompletionSink for Collect {
        fn unit_finished(&mut self, index: usize, _unit: &TestUnit) {
            self.0.push(index);
        }
    }

    fn fleet() -> Vec<RemoteTarget> {
        vec![
            RemoteTarget::new("http://node-a:4444"),
            RemoteTarget::new("http://node-b:4444"),
        ]
    }

    fn units(n: usize) -> Vec<TestUnit> {
        (0..n)
            .map(|i| TestUnit::new(format!("unit-{i}"), || Ok(())))
            .collect()
    }

    #[test]
    fn test_new_rejects_empty_fleet() {
        assert!(CloudStrategy::new(Vec::new()).is_err());
    }

    #[test]
    fn test_round_robin_shards() {
        let strategy = CloudStrategy::with_transport(fleet(), Arc::new(MockTransport::default()));
        assert_eq!(strategy.shards(5), vec![vec![0, 2, 4], vec![1, 3]]);
        assert_eq!(strategy.shards(1), vec![vec![0], vec![]]);
    }

    #[tokio::test]
    async fn test_cloud_runs_every_shard() {
        let transport = Arc::new(MockTransport::failing(&["unit-3"]));
        let strategy = CloudStrategy::with_transport(fleet(), transport.clone());

        let mut units = units(4);
        let cancel = CancellationToken::new();
        let mut sink = Collect::default();
        let mut batch = Batch::new(&mut units, &[], None, &cancel, &mut sink);
        strategy.execute(&mut batch).await.unwrap();
        drop(batch);

        assert_eq!(transport.requests.lock().unwrap().len(), 2);
        assert!(units[..3].iter().all(|u| u.outcome().is_passed()));
        assert_eq!(units[3].outcome().message(), Some("remote: unit-3"));
        assert_eq!(sink.0, vec![0, 2, 1, 3]);
    }

    #[tokio::test]
    async fn test_cloud_keeps_partial_results_on_node_failure() {
        let transport = Arc::new(MockTransport::default().with_down("http://node-b:4444"));
        let strategy = CloudStrategy::with_transport(fleet(), transport);

        let mut units = units(4);
        let cancel = CancellationToken::new();
        let mut sink = Collect::default();
        let mut batch = Batch::new(&mut units, &[], None, &cancel, &mut sink);
        let err = strategy.execute(&mut batch).await.unwrap_err();
        drop(batch);

        match err {
            StrategyError::Transport { endpoint, .. } => {
                assert_eq!(endpoint, "http://node-b:4444")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(units[0].outcome().is_passed());
        assert!(units[2].outcome().is_passed());
        assert!(units[1].outcome().is_pending());
        assert!(units[3].outcome().is_pending());
        assert_eq!(sink.0, vec![0, 2]);
    }
}
