use crate::closure::ClosureFactory;
use crate::config::QueryNodeConfig;
use crate::cursor::ItemPipeline;
use crate::engine::{QueryEngine, QuerySpec};
use crate::error::{QueryError, QueryResult};
use crate::model::{CursorOptions, NodeId, QueryKind, QueryMetrics, QueryRequest, ResultPage, SessionId};
use crate::pagination::{fetch_page, next_page};
use crate::session::SessionRecord;
use crate::store::SessionRegistry;
use crate::transport::{JobOutput, NodeJob};
use std::sync::Arc;

/// Everything a cluster member needs to run query jobs in-process: its engine, its closure
/// types and its session registry.
///
/// All methods block; async callers run them on the blocking pool.
pub struct LocalNode {
    id: NodeId,
    engine: Arc<dyn QueryEngine>,
    closures: Arc<ClosureFactory>,
    sessions: Arc<dyn SessionRegistry>,
    config: QueryNodeConfig,
}

impl LocalNode {
    pub fn new(
        id: NodeId,
        engine: Arc<dyn QueryEngine>,
        closures: Arc<ClosureFactory>,
        sessions: Arc<dyn SessionRegistry>,
        config: QueryNodeConfig,
    ) -> Self {
        Self {
            id,
            engine,
            closures,
            sessions,
            config,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn sessions(&self) -> &Arc<dyn SessionRegistry> {
        &self.sessions
    }

    pub fn closures(&self) -> &Arc<ClosureFactory> {
        &self.closures
    }

    pub fn config(&self) -> &QueryNodeConfig {
        &self.config
    }

    pub fn run(&self, job: NodeJob) -> QueryResult<JobOutput> {
        match job {
            NodeJob::Execute(request) => self.execute(&request).map(JobOutput::Page),
            NodeJob::Fetch {
                session_id,
                page_size,
            } => self.fetch(session_id, page_size).map(JobOutput::Page),
            NodeJob::RebuildIndexes {
                cache_name,
                class_name,
            } => self
                .rebuild_indexes(&cache_name, class_name.as_deref())
                .map(|_| JobOutput::Done),
            NodeJob::ResetMetrics { cache_name } => {
                self.reset_metrics(&cache_name).map(|_| JobOutput::Done)
            }
            NodeJob::GetMetrics { cache_name } => self.metrics(&cache_name).map(JobOutput::Metrics),
        }
    }

    /// Starts the query, registers its session and returns the first page inline.
    pub fn execute(&self, request: &QueryRequest) -> QueryResult<ResultPage> {
        let query = self.build_query(request)?;
        let page_size = self.config.page_size(request.page_size);
        let options = CursorOptions {
            page_size,
            timeout: self.config.timeout(request.timeout_ms),
            include_backups: request.include_backups,
            enable_dedup: request.enable_dedup,
            keep_all: false,
        };
        let pipeline = self.item_pipeline(request)?;

        let cursor = self
            .engine
            .start(&request.cache_name, query, &request.query_args, &options)?;
        let cursor = pipeline.wrap(cursor);

        let id = SessionId::next();
        let record = SessionRecord::new(id, request.cache_name.clone(), cursor);
        self.sessions.insert_if_absent(Arc::clone(&record))?;
        tracing::info!(
            session_id = %id,
            cache = %request.cache_name,
            kind = %request.kind,
            node = %self.id,
            "query session started"
        );

        next_page(self.sessions.as_ref(), &record, page_size)
    }

    pub fn fetch(&self, session_id: SessionId, page_size: u32) -> QueryResult<ResultPage> {
        fetch_page(
            self.sessions.as_ref(),
            session_id,
            self.config.page_size(page_size),
        )
    }

    pub fn rebuild_indexes(&self, cache: &str, type_name: Option<&str>) -> QueryResult<()> {
        self.engine.rebuild_indexes(cache, type_name)?;
        tracing::info!(cache, type_name, node = %self.id, "rebuilt query indexes");
        Ok(())
    }

    pub fn reset_metrics(&self, cache: &str) -> QueryResult<()> {
        self.engine.reset_metrics(cache)?;
        tracing::info!(cache, node = %self.id, "reset query metrics");
        Ok(())
    }

    pub fn metrics(&self, cache: &str) -> QueryResult<QueryMetrics> {
        self.engine.metrics(cache)
    }

    fn build_query(&self, request: &QueryRequest) -> QueryResult<QuerySpec> {
        let query = match request.kind {
            QueryKind::Sql => QuerySpec::Sql {
                type_name: required(request.class_name.as_ref(), "className", request.kind)?,
                clause: required(request.clause.as_ref(), "clause", request.kind)?,
            },
            QueryKind::SqlFields => QuerySpec::SqlFields {
                clause: required(request.clause.as_ref(), "clause", request.kind)?,
            },
            QueryKind::FullText => QuerySpec::FullText {
                type_name: required(request.class_name.as_ref(), "className", request.kind)?,
                text: required(request.clause.as_ref(), "clause", request.kind)?,
            },
            QueryKind::Scan => QuerySpec::Scan {
                filter: request
                    .predicate_spec()
                    .map(|spec| self.closures.predicate(&spec))
                    .transpose()?,
            },
            QueryKind::Spi => return Err(QueryError::UnsupportedQueryKind(request.kind.to_string())),
        };
        Ok(query)
    }

    fn item_pipeline(&self, request: &QueryRequest) -> QueryResult<ItemPipeline> {
        if let Some(spec) = &request.remote_reducer {
            return Ok(ItemPipeline::Reduce(self.closures.reducer(spec)?));
        }
        if let Some(spec) = &request.remote_transformer {
            return Ok(ItemPipeline::Transform(self.closures.transformer(spec)?));
        }
        Ok(ItemPipeline::Raw)
    }
}

fn required(value: Option<&String>, field: &str, kind: QueryKind) -> QueryResult<String> {
    value
        .cloned()
        .ok_or_else(|| QueryError::InvalidRequest(format!("{kind} query requires `{field}`")))
}
