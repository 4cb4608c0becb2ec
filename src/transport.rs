use crate::error::{QueryError, QueryResult};
use crate::model::{NodeId, QueryMetrics, QueryRequest, ResultPage, SessionId};
use crate::node::LocalNode;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Unit of work shipped to the node that must run it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "camelCase")]
pub enum NodeJob {
    Execute(QueryRequest),
    #[serde(rename_all = "camelCase")]
    Fetch {
        session_id: SessionId,
        page_size: u32,
    },
    #[serde(rename_all = "camelCase")]
    RebuildIndexes {
        cache_name: String,
        class_name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ResetMetrics { cache_name: String },
    #[serde(rename_all = "camelCase")]
    GetMetrics { cache_name: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output", content = "value", rename_all = "camelCase")]
pub enum JobOutput {
    Page(ResultPage),
    Done,
    Metrics(QueryMetrics),
}

/// Delivers jobs to remote cluster members.
///
/// A job is delivered to exactly the addressed node. Implementations must never fail over to
/// another member: session jobs only make sense where the cursor lives. Errors raised by the
/// job on the remote node are reported as [`QueryError::RemoteExecutionFailed`].
#[async_trait]
pub trait NodeTransport: Send + Sync + 'static {
    async fn dispatch(&self, node: NodeId, job: NodeJob) -> QueryResult<JobOutput>;
}

/// Transport for nodes sharing one process. Each job runs on the blocking pool, as it would on
/// the worker pool of a remote member.
#[derive(Default)]
pub struct InProcessTransport {
    nodes: DashMap<NodeId, Arc<LocalNode>>,
}

impl InProcessTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, node: Arc<LocalNode>) {
        self.nodes.insert(node.id(), node);
    }

    pub fn detach(&self, node: &NodeId) -> Option<Arc<LocalNode>> {
        self.nodes.remove(node).map(|(_, node)| node)
    }
}

#[async_trait]
impl NodeTransport for InProcessTransport {
    async fn dispatch(&self, node: NodeId, job: NodeJob) -> QueryResult<JobOutput> {
        let target = self
            .nodes
            .get(&node)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| QueryError::Transport {
                node,
                message: "node is not attached to this transport".into(),
            })?;

        run_blocking(move || target.run(job))
            .await
            .map_err(|err| QueryError::remote(node, err))
    }
}

/// Runs a blocking node job on the tokio blocking pool.
pub(crate) async fn run_blocking<T, F>(job: F) -> QueryResult<T>
where
    F: FnOnce() -> QueryResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| QueryError::Worker(err.to_string()))?
}
