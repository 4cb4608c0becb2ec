mod common;

use cache_query_session::model::CacheMode;
use cache_query_session::transport::NodeJob;
use cache_query_session::{
    ExecutionTarget, NodeId, QueryCommand, QueryError, QueryKind, QueryRequest, QueryResponse,
    Router,
};
use common::{people, NodeView, TestCluster, Topology, PEOPLE};
use std::sync::Arc;

fn router_for(local: NodeId, topology: &Arc<Topology>) -> Router {
    Router::new(Arc::new(NodeView {
        local,
        topology: Arc::clone(topology),
    }))
}

#[test]
fn missing_and_local_destination_both_route_locally() {
    let topology = Arc::new(Topology::default());
    let local = NodeId::new();
    topology.join(local);
    let router = router_for(local, &topology);

    assert_eq!(router.route(None, PEOPLE).expect("none"), ExecutionTarget::Local);
    assert_eq!(
        router.route(Some(local), PEOPLE).expect("self"),
        ExecutionTarget::Local
    );
}

#[test]
fn replicated_cache_stays_local_whatever_the_hint() {
    let topology = Arc::new(Topology::default());
    let local = NodeId::new();
    let other = NodeId::new();
    topology.join(local);
    topology.join(other);
    topology.host(PEOPLE, local, CacheMode::Replicated);
    topology.host(PEOPLE, other, CacheMode::Replicated);
    let router = router_for(local, &topology);

    assert_eq!(
        router.route(Some(other), PEOPLE).expect("replicated"),
        ExecutionTarget::Local
    );
    // Even a departed node is irrelevant when a local replica exists.
    assert_eq!(
        router.route(Some(NodeId::new()), PEOPLE).expect("replicated"),
        ExecutionTarget::Local
    );
}

#[test]
fn partitioned_cache_goes_to_named_member() {
    let topology = Arc::new(Topology::default());
    let local = NodeId::new();
    let other = NodeId::new();
    topology.join(local);
    topology.join(other);
    topology.host(PEOPLE, local, CacheMode::Partitioned);
    let router = router_for(local, &topology);

    assert_eq!(
        router.route(Some(other), PEOPLE).expect("remote"),
        ExecutionTarget::Remote(other)
    );
}

#[test]
fn departed_destination_is_retryable() {
    let topology = Arc::new(Topology::default());
    let local = NodeId::new();
    let gone = NodeId::new();
    topology.join(local);
    topology.join(gone);
    topology.leave(&gone);
    let router = router_for(local, &topology);

    let err = router.route(Some(gone), PEOPLE).expect_err("gone");
    assert!(err.is_retryable());
    match err {
        QueryError::UnreachableDestination { node, cache } => {
            assert_eq!(node, gone);
            assert_eq!(cache, PEOPLE);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_destination_fails_without_dispatch() {
    let cluster = TestCluster::new(2);
    cluster.host_everywhere(PEOPLE, CacheMode::Partitioned, people(4));

    let mut request = QueryRequest::new(PEOPLE, QueryKind::Scan);
    request.destination = Some(NodeId::new());

    let err = cluster.nodes[0]
        .handler
        .handle(QueryCommand::Execute(request))
        .await
        .expect_err("unknown destination");
    assert!(matches!(err, QueryError::UnreachableDestination { .. }));
    assert_eq!(cluster.transport.dispatch_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_query_runs_on_destination_only() {
    let cluster = TestCluster::new(2);
    cluster.host_on(1, PEOPLE, CacheMode::Partitioned, people(4));
    let target = cluster.nodes[1].id;

    let mut request = QueryRequest::new(PEOPLE, QueryKind::Scan);
    request.destination = Some(target);
    request.page_size = 10;

    let response = cluster.nodes[0]
        .handler
        .handle(QueryCommand::Execute(request))
        .await
        .expect("remote execute");
    let QueryResponse::Page(page) = response else {
        panic!("expected a page, got {response:?}");
    };
    assert_eq!(page.items.len(), 4);
    assert!(page.last);

    let dispatched = cluster.transport.dispatched.lock();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].0, target);
    assert!(matches!(dispatched[0].1, NodeJob::Execute(_)));
    assert!(cluster.nodes[0].engine.last_query.lock().is_none());
}
