use crate::closure::ScanPredicate;
use crate::cursor::Cursor;
use crate::error::QueryResult;
use crate::model::{CursorOptions, QueryMetrics};
use serde_json::Value;
use std::fmt;

/// Query handed to the engine, already resolved from the request kind.
pub enum QuerySpec {
    Sql { type_name: String, clause: String },
    SqlFields { clause: String },
    FullText { type_name: String, text: String },
    Scan { filter: Option<Box<dyn ScanPredicate>> },
}

impl fmt::Debug for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql { type_name, clause } => f
                .debug_struct("Sql")
                .field("type_name", type_name)
                .field("clause", clause)
                .finish(),
            Self::SqlFields { clause } => f.debug_struct("SqlFields").field("clause", clause).finish(),
            Self::FullText { type_name, text } => f
                .debug_struct("FullText")
                .field("type_name", type_name)
                .field("text", text)
                .finish(),
            Self::Scan { filter } => f
                .debug_struct("Scan")
                .field("filtered", &filter.is_some())
                .finish(),
        }
    }
}

/// The node-local cache query engine.
pub trait QueryEngine: Send + Sync + 'static {
    /// Starts a query over `cache` and returns its cursor.
    fn start(
        &self,
        cache: &str,
        query: QuerySpec,
        args: &[Value],
        options: &CursorOptions,
    ) -> QueryResult<Box<dyn Cursor>>;

    /// Rebuilds indexes for one value type, or all of them when `type_name` is `None`.
    fn rebuild_indexes(&self, cache: &str, type_name: Option<&str>) -> QueryResult<()>;

    fn reset_metrics(&self, cache: &str) -> QueryResult<()>;

    fn metrics(&self, cache: &str) -> QueryResult<QueryMetrics>;
}
