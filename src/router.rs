use crate::cluster::ClusterView;
use crate::error::{QueryError, QueryResult};
use crate::model::{CacheMode, NodeId};
use std::sync::Arc;

/// Where a session-bound command runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionTarget {
    Local,
    /// Dispatched to exactly this node; never failed over, because the cursor lives there.
    Remote(NodeId),
}

pub struct Router {
    cluster: Arc<dyn ClusterView>,
}

impl Router {
    pub fn new(cluster: Arc<dyn ClusterView>) -> Self {
        Self { cluster }
    }

    pub fn route(&self, destination: Option<NodeId>, cache: &str) -> QueryResult<ExecutionTarget> {
        let local = self.cluster.local_node_id();
        let node = match destination {
            None => return Ok(ExecutionTarget::Local),
            Some(node) if node == local => return Ok(ExecutionTarget::Local),
            Some(node) => node,
        };

        // Any replica serves a replicated read, so skip the hop.
        if self.cluster.local_cache_mode(cache) == Some(CacheMode::Replicated) {
            tracing::debug!(cache, requested = %node, "routing to local replica");
            return Ok(ExecutionTarget::Local);
        }

        if !self.cluster.is_member(&node) {
            tracing::warn!(cache, node = %node, "destination node has left the cluster");
            return Err(QueryError::UnreachableDestination {
                node,
                cache: cache.to_string(),
            });
        }

        tracing::debug!(cache, node = %node, "routing to remote node");
        Ok(ExecutionTarget::Remote(node))
    }
}
