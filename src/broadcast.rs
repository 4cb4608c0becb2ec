use crate::cluster::ClusterView;
use crate::error::{QueryError, QueryResult};
use crate::model::Ack;
use crate::node::LocalNode;
use crate::transport::{run_blocking, NodeJob, NodeTransport};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Administrative action applied on every node hosting a cache. Both are idempotent per node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminAction {
    /// Rebuild indexes of one value type, or of all types when `None`.
    RebuildIndexes { class_name: Option<String> },
    ResetMetrics,
}

impl AdminAction {
    fn job(&self, cache: &str) -> NodeJob {
        match self {
            Self::RebuildIndexes { class_name } => NodeJob::RebuildIndexes {
                cache_name: cache.to_string(),
                class_name: class_name.clone(),
            },
            Self::ResetMetrics => NodeJob::ResetMetrics {
                cache_name: cache.to_string(),
            },
        }
    }
}

/// Fans administrative actions out to every node hosting a cache and folds the outcomes.
pub struct BroadcastCoordinator {
    local: Arc<LocalNode>,
    cluster: Arc<dyn ClusterView>,
    transport: Arc<dyn NodeTransport>,
}

impl BroadcastCoordinator {
    pub fn new(
        local: Arc<LocalNode>,
        cluster: Arc<dyn ClusterView>,
        transport: Arc<dyn NodeTransport>,
    ) -> Self {
        Self {
            local,
            cluster,
            transport,
        }
    }

    /// Runs `action` on every hosting node and waits for all of them.
    ///
    /// The first failure observed is returned as a single error once every node has finished;
    /// nodes that already succeeded are not rolled back.
    pub async fn broadcast(&self, cache: &str, action: AdminAction) -> QueryResult<Ack> {
        let nodes = self.cluster.cache_nodes(cache);
        if nodes.is_empty() {
            return Err(QueryError::NoCacheNodes(cache.to_string()));
        }

        let mut tasks = JoinSet::new();
        for node in nodes.iter().copied() {
            let job = action.job(cache);
            if node == self.local.id() {
                let local = Arc::clone(&self.local);
                tasks.spawn(async move {
                    let result = run_blocking(move || local.run(job)).await;
                    (node, result.map_err(|err| QueryError::remote(node, err)))
                });
            } else {
                let transport = Arc::clone(&self.transport);
                tasks.spawn(async move { (node, transport.dispatch(node, job).await) });
            }
        }

        let mut first_failure: Option<QueryError> = None;
        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok((_, Ok(_))) => continue,
                Ok((node, Err(err))) => {
                    tracing::warn!(cache, node = %node, error = %err, "broadcast action failed on node");
                    QueryError::remote(node, err)
                }
                Err(err) => QueryError::Worker(err.to_string()),
            };
            if first_failure.is_none() {
                first_failure = Some(failure);
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => {
                tracing::info!(cache, nodes = nodes.len(), action = ?action, "broadcast completed");
                Ok(Ack::ok())
            }
        }
    }
}

