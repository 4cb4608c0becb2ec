use crate::model::{CacheMode, NodeId};

/// Current cluster topology as seen from the local node.
pub trait ClusterView: Send + Sync + 'static {
    fn local_node_id(&self) -> NodeId;

    /// Whether `node` is currently a live member.
    fn is_member(&self, node: &NodeId) -> bool;

    /// Live members hosting `cache`, the local node included when it hosts it.
    fn cache_nodes(&self, cache: &str) -> Vec<NodeId>;

    /// Mode of `cache` if it is started on the local node.
    fn local_cache_mode(&self, cache: &str) -> Option<CacheMode>;
}
