#![allow(dead_code)]

use async_trait::async_trait;
use cache_query_session::closure::{Reducer, ScanPredicate, Transformer};
use cache_query_session::error::ErrorCode;
use cache_query_session::model::{CacheMode, CursorOptions, QueryMetrics};
use cache_query_session::transport::{JobOutput, NodeJob};
use cache_query_session::{
    create_session_registry, ArgType, Capability, ClosureFactory, ClosureInstance, ClosureType,
    ClusterView, Cursor, InProcessTransport, IterCursor, LocalNode, NodeId, NodeTransport,
    QueryCommandHandler, QueryEngine, QueryError, QueryNodeConfig, QueryResult, QuerySpec,
    RegistryConfig,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const PEOPLE: &str = "people";

pub fn person(name: &str, age: i64) -> (Value, Value) {
    (json!(name), json!({ "type": "Person", "name": name, "age": age }))
}

pub fn people(count: usize) -> Vec<(Value, Value)> {
    (0..count)
        .map(|i| person(&format!("p{i}"), 20 + i as i64))
        .collect()
}

/// Shared membership + cache placement for a set of in-process nodes.
#[derive(Default)]
pub struct Topology {
    members: RwLock<HashSet<NodeId>>,
    hosts: RwLock<HashMap<String, Vec<NodeId>>>,
    modes: RwLock<HashMap<(NodeId, String), CacheMode>>,
}

impl Topology {
    pub fn join(&self, node: NodeId) {
        self.members.write().insert(node);
    }

    pub fn leave(&self, node: &NodeId) {
        self.members.write().remove(node);
        for hosts in self.hosts.write().values_mut() {
            hosts.retain(|host| host != node);
        }
    }

    pub fn host(&self, cache: &str, node: NodeId, mode: CacheMode) {
        self.hosts
            .write()
            .entry(cache.to_string())
            .or_default()
            .push(node);
        self.modes.write().insert((node, cache.to_string()), mode);
    }
}

pub struct NodeView {
    pub local: NodeId,
    pub topology: Arc<Topology>,
}

impl ClusterView for NodeView {
    fn local_node_id(&self) -> NodeId {
        self.local
    }

    fn is_member(&self, node: &NodeId) -> bool {
        self.topology.members.read().contains(node)
    }

    fn cache_nodes(&self, cache: &str) -> Vec<NodeId> {
        self.topology
            .hosts
            .read()
            .get(cache)
            .cloned()
            .unwrap_or_default()
    }

    fn local_cache_mode(&self, cache: &str) -> Option<CacheMode> {
        self.topology
            .modes
            .read()
            .get(&(self.local, cache.to_string()))
            .copied()
    }
}

/// Engine over in-memory key/value pairs per cache.
#[derive(Default)]
pub struct MemoryEngine {
    data: RwLock<HashMap<String, Vec<(Value, Value)>>>,
    pub rebuilds: Mutex<Vec<(String, Option<String>)>>,
    pub resets: AtomicUsize,
    pub fail_admin: AtomicBool,
    pub last_options: Mutex<Option<CursorOptions>>,
    pub last_query: Mutex<Option<String>>,
}

impl MemoryEngine {
    pub fn load(&self, cache: &str, entries: Vec<(Value, Value)>) {
        self.data.write().insert(cache.to_string(), entries);
    }

    fn admin_guard(&self, cache: &str) -> QueryResult<()> {
        if self.fail_admin.load(Ordering::SeqCst) {
            return Err(QueryError::engine(
                ErrorCode::Internal,
                cache,
                "index storage is corrupted",
            ));
        }
        Ok(())
    }
}

impl QueryEngine for MemoryEngine {
    fn start(
        &self,
        cache: &str,
        query: QuerySpec,
        _args: &[Value],
        options: &CursorOptions,
    ) -> QueryResult<Box<dyn Cursor>> {
        let entries = self
            .data
            .read()
            .get(cache)
            .cloned()
            .ok_or_else(|| QueryError::engine(ErrorCode::NotFound, cache, "cache is not started"))?;
        *self.last_options.lock() = Some(options.clone());
        *self.last_query.lock() = Some(format!("{query:?}"));

        let items: Vec<Value> = match query {
            QuerySpec::Sql { type_name, .. } => entries
                .into_iter()
                .map(|(_, value)| value)
                .filter(|value| value["type"] == type_name.as_str())
                .collect(),
            QuerySpec::SqlFields { .. } => entries
                .into_iter()
                .map(|(_, value)| json!([value["name"], value["age"]]))
                .collect(),
            QuerySpec::FullText { text, .. } => entries
                .into_iter()
                .map(|(_, value)| value)
                .filter(|value| value.to_string().contains(&text))
                .collect(),
            QuerySpec::Scan { filter } => entries
                .into_iter()
                .filter(|(key, value)| filter.as_ref().map_or(true, |f| f.apply(key, value)))
                .map(|(_, value)| value)
                .collect(),
        };
        Ok(Box::new(IterCursor::new(items)))
    }

    fn rebuild_indexes(&self, cache: &str, type_name: Option<&str>) -> QueryResult<()> {
        self.admin_guard(cache)?;
        self.rebuilds
            .lock()
            .push((cache.to_string(), type_name.map(str::to_string)));
        Ok(())
    }

    fn reset_metrics(&self, cache: &str) -> QueryResult<()> {
        self.admin_guard(cache)?;
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn metrics(&self, _cache: &str) -> QueryResult<QueryMetrics> {
        Ok(QueryMetrics {
            minimum_time_ms: 1,
            maximum_time_ms: 9,
            average_time_ms: 4.5,
            executions: 2,
            fails: self.resets.load(Ordering::SeqCst) as u64,
        })
    }
}

pub struct AgeAbove(pub i64);

impl ScanPredicate for AgeAbove {
    fn apply(&self, _key: &Value, value: &Value) -> bool {
        value["age"].as_i64().is_some_and(|age| age > self.0)
    }
}

#[derive(Default)]
pub struct AgeSum(pub i64);

impl Reducer for AgeSum {
    fn collect(&mut self, item: Value) -> bool {
        self.0 += item["age"].as_i64().unwrap_or_default();
        true
    }

    fn reduce(&mut self) -> Value {
        json!(self.0)
    }
}

pub struct NameOnly;

impl Transformer for NameOnly {
    fn apply(&self, item: Value) -> Value {
        item["name"].clone()
    }
}

/// Factory with the closure types the tests refer to by name.
pub fn closure_factory() -> Arc<ClosureFactory> {
    let factory = ClosureFactory::new();
    factory.register(
        ClosureType::new("test.AgeAbove", Capability::Predicate)
            .constructor(&[ArgType::Integer], |args| {
                Ok(ClosureInstance::predicate(AgeAbove(
                    args[0].as_i64().unwrap_or_default(),
                )))
            })
            .constructor(&[], |_| Ok(ClosureInstance::predicate(AgeAbove(0)))),
    );
    factory.register(
        ClosureType::new("test.AgeSum", Capability::Reducer)
            .constructor(&[], |_| Ok(ClosureInstance::reducer(AgeSum::default()))),
    );
    factory.register(
        ClosureType::new("test.NameOnly", Capability::Transformer)
            .constructor(&[], |_| Ok(ClosureInstance::transformer(NameOnly))),
    );
    Arc::new(factory)
}

/// In-process transport that counts dispatches.
#[derive(Default)]
pub struct RecordingTransport {
    pub inner: InProcessTransport,
    pub dispatched: Mutex<Vec<(NodeId, NodeJob)>>,
}

impl RecordingTransport {
    pub fn dispatch_count(&self) -> usize {
        self.dispatched.lock().len()
    }
}

#[async_trait]
impl NodeTransport for RecordingTransport {
    async fn dispatch(&self, node: NodeId, job: NodeJob) -> QueryResult<JobOutput> {
        self.dispatched.lock().push((node, job.clone()));
        self.inner.dispatch(node, job).await
    }
}

pub struct TestNode {
    pub id: NodeId,
    pub engine: Arc<MemoryEngine>,
    pub local: Arc<LocalNode>,
    pub handler: QueryCommandHandler,
}

pub struct TestCluster {
    pub topology: Arc<Topology>,
    pub transport: Arc<RecordingTransport>,
    pub nodes: Vec<TestNode>,
}

impl TestCluster {
    pub fn new(size: usize) -> Self {
        Self::with_config(size, QueryNodeConfig::default())
    }

    pub fn with_config(size: usize, config: QueryNodeConfig) -> Self {
        let topology = Arc::new(Topology::default());
        let transport = Arc::new(RecordingTransport::default());
        let closures = closure_factory();

        let nodes = (0..size)
            .map(|_| {
                let id = NodeId::new();
                let engine = Arc::new(MemoryEngine::default());
                let local = Arc::new(LocalNode::new(
                    id,
                    engine.clone(),
                    Arc::clone(&closures),
                    create_session_registry(RegistryConfig::InMemory).expect("registry"),
                    config.clone(),
                ));
                topology.join(id);
                transport.inner.attach(Arc::clone(&local));
                let view = Arc::new(NodeView {
                    local: id,
                    topology: Arc::clone(&topology),
                });
                let handler = QueryCommandHandler::new(
                    Arc::clone(&local),
                    view,
                    transport.clone() as Arc<dyn NodeTransport>,
                );
                TestNode {
                    id,
                    engine,
                    local,
                    handler,
                }
            })
            .collect();

        Self {
            topology,
            transport,
            nodes,
        }
    }

    /// Starts `cache` on every node with the same entries.
    pub fn host_everywhere(&self, cache: &str, mode: CacheMode, entries: Vec<(Value, Value)>) {
        for node in &self.nodes {
            node.engine.load(cache, entries.clone());
            self.topology.host(cache, node.id, mode);
        }
    }

    /// Starts `cache` on one node only.
    pub fn host_on(&self, index: usize, cache: &str, mode: CacheMode, entries: Vec<(Value, Value)>) {
        let node = &self.nodes[index];
        node.engine.load(cache, entries);
        self.topology.host(cache, node.id, mode);
    }
}
