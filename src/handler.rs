use crate::broadcast::{AdminAction, BroadcastCoordinator};
use crate::cluster::ClusterView;
use crate::error::{serde_error, QueryError, QueryResult};
use crate::model::{Ack, NodeId, QueryMetrics, QueryRequest, ResultPage, SessionId};
use crate::node::LocalNode;
use crate::router::{ExecutionTarget, Router};
use crate::transport::{run_blocking, JobOutput, NodeJob, NodeTransport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Wire names of the commands served by [`QueryCommandHandler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandName {
    Execute,
    Fetch,
    RebuildIndexes,
    GetMetrics,
    ResetMetrics,
}

impl CommandName {
    pub const ALL: [CommandName; 5] = [
        Self::Execute,
        Self::Fetch,
        Self::RebuildIndexes,
        Self::GetMetrics,
        Self::ResetMetrics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Execute => "CACHE_QUERY_EXECUTE",
            Self::Fetch => "CACHE_QUERY_FETCH",
            Self::RebuildIndexes => "CACHE_QUERY_REBUILD_INDEXES",
            Self::GetMetrics => "CACHE_QUERY_GET_METRICS",
            Self::ResetMetrics => "CACHE_QUERY_RESET_METRICS",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| QueryError::UnsupportedCommand(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub session_id: SessionId,
    #[serde(default)]
    pub page_size: u32,
    /// Used for routing only.
    #[serde(default)]
    pub cache_name: String,
    #[serde(default)]
    pub destination: Option<NodeId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheCommandBody {
    cache_name: String,
    #[serde(default)]
    class_name: Option<String>,
    #[serde(default)]
    destination: Option<NodeId>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryCommand {
    Execute(QueryRequest),
    Fetch(FetchRequest),
    RebuildIndexes {
        cache_name: String,
        class_name: Option<String>,
    },
    ResetMetrics {
        cache_name: String,
    },
    GetMetrics {
        cache_name: String,
        destination: Option<NodeId>,
    },
}

impl QueryCommand {
    /// Decodes a command from its wire name and JSON body.
    pub fn parse(name: &str, body: Value) -> QueryResult<Self> {
        let command = match name.parse::<CommandName>()? {
            CommandName::Execute => {
                Self::Execute(serde_json::from_value(body).map_err(serde_error)?)
            }
            CommandName::Fetch => Self::Fetch(serde_json::from_value(body).map_err(serde_error)?),
            CommandName::RebuildIndexes => {
                let body: CacheCommandBody = serde_json::from_value(body).map_err(serde_error)?;
                Self::RebuildIndexes {
                    cache_name: body.cache_name,
                    class_name: body.class_name,
                }
            }
            CommandName::ResetMetrics => {
                let body: CacheCommandBody = serde_json::from_value(body).map_err(serde_error)?;
                Self::ResetMetrics {
                    cache_name: body.cache_name,
                }
            }
            CommandName::GetMetrics => {
                let body: CacheCommandBody = serde_json::from_value(body).map_err(serde_error)?;
                Self::GetMetrics {
                    cache_name: body.cache_name,
                    destination: body.destination,
                }
            }
        };
        Ok(command)
    }

    pub fn name(&self) -> CommandName {
        match self {
            Self::Execute(_) => CommandName::Execute,
            Self::Fetch(_) => CommandName::Fetch,
            Self::RebuildIndexes { .. } => CommandName::RebuildIndexes,
            Self::ResetMetrics { .. } => CommandName::ResetMetrics,
            Self::GetMetrics { .. } => CommandName::GetMetrics,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Page(ResultPage),
    Ack(Ack),
    Metrics(QueryMetrics),
}

impl From<&QueryError> for Ack {
    fn from(err: &QueryError) -> Self {
        Ack::failed(err.to_string())
    }
}

/// Entry point for remote query commands arriving at a node.
///
/// Session commands are routed to the node owning the cursor; administrative commands are
/// broadcast to every node hosting the cache. Local work runs on the blocking pool, so no
/// request holds up the async runtime while a cursor blocks.
pub struct QueryCommandHandler {
    local: Arc<LocalNode>,
    router: Router,
    transport: Arc<dyn NodeTransport>,
    broadcaster: BroadcastCoordinator,
}

impl QueryCommandHandler {
    pub fn new(
        local: Arc<LocalNode>,
        cluster: Arc<dyn ClusterView>,
        transport: Arc<dyn NodeTransport>,
    ) -> Self {
        Self {
            router: Router::new(Arc::clone(&cluster)),
            broadcaster: BroadcastCoordinator::new(
                Arc::clone(&local),
                cluster,
                Arc::clone(&transport),
            ),
            local,
            transport,
        }
    }

    pub fn supported_commands(&self) -> &'static [CommandName] {
        &CommandName::ALL
    }

    pub async fn handle(&self, command: QueryCommand) -> QueryResult<QueryResponse> {
        match command {
            QueryCommand::Execute(request) => {
                let destination = request.destination;
                let cache = request.cache_name.clone();
                let page = self
                    .execute(destination, &cache, NodeJob::Execute(request))
                    .await?;
                page_of(page)
            }
            QueryCommand::Fetch(fetch) => {
                let job = NodeJob::Fetch {
                    session_id: fetch.session_id,
                    page_size: fetch.page_size,
                };
                let page = self
                    .execute(fetch.destination, &fetch.cache_name, job)
                    .await?;
                page_of(page)
            }
            QueryCommand::RebuildIndexes {
                cache_name,
                class_name,
            } => self
                .broadcaster
                .broadcast(&cache_name, AdminAction::RebuildIndexes { class_name })
                .await
                .map(QueryResponse::Ack),
            QueryCommand::ResetMetrics { cache_name } => self
                .broadcaster
                .broadcast(&cache_name, AdminAction::ResetMetrics)
                .await
                .map(QueryResponse::Ack),
            QueryCommand::GetMetrics {
                cache_name,
                destination,
            } => {
                let job = NodeJob::GetMetrics {
                    cache_name: cache_name.clone(),
                };
                match self.execute(destination, &cache_name, job).await? {
                    JobOutput::Metrics(metrics) => Ok(QueryResponse::Metrics(metrics)),
                    other => Err(unexpected(other)),
                }
            }
        }
    }

    /// Decodes and handles a command given by wire name.
    pub async fn handle_named(&self, name: &str, body: Value) -> QueryResult<QueryResponse> {
        let command = QueryCommand::parse(name, body)?;
        self.handle(command).await
    }

    async fn execute(
        &self,
        destination: Option<NodeId>,
        cache: &str,
        job: NodeJob,
    ) -> QueryResult<JobOutput> {
        match self.router.route(destination, cache)? {
            ExecutionTarget::Local => {
                let local = Arc::clone(&self.local);
                run_blocking(move || local.run(job)).await
            }
            ExecutionTarget::Remote(node) => self.transport.dispatch(node, job).await,
        }
    }
}

fn page_of(output: JobOutput) -> QueryResult<QueryResponse> {
    match output {
        JobOutput::Page(page) => Ok(QueryResponse::Page(page)),
        other => Err(unexpected(other)),
    }
}

fn unexpected(output: JobOutput) -> QueryError {
    QueryError::Worker(format!("unexpected job output: {output:?}"))
}
