use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

static SESSION_ID_GEN: AtomicU64 = AtomicU64::new(0);

/// Identifier of a live query session on the node that started it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Draws the next identifier from the process-wide sequence. Identifiers are never reused
    /// while the process lives.
    pub fn next() -> Self {
        Self(SESSION_ID_GEN.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Identifier of a cluster member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Generates a fresh random node identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Distribution mode of a cache as configured on the local node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheMode {
    Local,
    Partitioned,
    Replicated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryKind {
    /// Parameterized clause over values of a named type.
    Sql,
    /// Clause projecting individual fields.
    SqlFields,
    /// Full-text match over values of a named type.
    FullText,
    /// Scan filtered by a predicate built from `class_name`.
    Scan,
    /// Indexing-SPI query; not served remotely.
    Spi,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sql => "SQL",
            Self::SqlFields => "SQL_FIELDS",
            Self::FullText => "FULL_TEXT",
            Self::Scan => "SCAN",
            Self::Spi => "SPI",
        };
        f.write_str(name)
    }
}

/// Names a closure to build at the executing node together with its constructor arguments.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ClosureSpec {
    pub class_name: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl ClosureSpec {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }
}

/// Everything needed to start a query cursor on the executing node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub cache_name: String,
    #[serde(rename = "type")]
    pub kind: QueryKind,
    /// Value type for `Sql`/`FullText`, predicate type for `Scan`.
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub clause: Option<String>,
    #[serde(default)]
    pub class_args: Vec<Value>,
    #[serde(default)]
    pub query_args: Vec<Value>,
    /// Zero selects the node default.
    #[serde(default)]
    pub page_size: u32,
    /// Zero selects the node default.
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub include_backups: bool,
    #[serde(default)]
    pub enable_dedup: bool,
    #[serde(default)]
    pub remote_reducer: Option<ClosureSpec>,
    #[serde(default)]
    pub remote_transformer: Option<ClosureSpec>,
    #[serde(default)]
    pub destination: Option<NodeId>,
}

impl QueryRequest {
    pub fn new(cache_name: impl Into<String>, kind: QueryKind) -> Self {
        Self {
            cache_name: cache_name.into(),
            kind,
            class_name: None,
            clause: None,
            class_args: Vec::new(),
            query_args: Vec::new(),
            page_size: 0,
            timeout_ms: 0,
            include_backups: false,
            enable_dedup: false,
            remote_reducer: None,
            remote_transformer: None,
            destination: None,
        }
    }

    /// Returns the scan predicate spec derived from `class_name` + `class_args`, if any.
    pub fn predicate_spec(&self) -> Option<ClosureSpec> {
        self.class_name
            .as_ref()
            .map(|name| ClosureSpec::new(name.clone()).with_args(self.class_args.clone()))
    }
}

/// A bounded batch of results plus the exhaustion flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ResultPage {
    pub session_id: SessionId,
    pub items: Vec<Value>,
    /// The cursor is exhausted and the session has been retired.
    pub last: bool,
}

/// Outcome of an administrative command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Query statistics reported by the engine for one cache on one node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct QueryMetrics {
    pub minimum_time_ms: u64,
    pub maximum_time_ms: u64,
    pub average_time_ms: f64,
    pub executions: u64,
    pub fails: u64,
}

/// Settings applied to a cursor before it starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorOptions {
    pub page_size: usize,
    pub timeout: Option<Duration>,
    pub include_backups: bool,
    pub enable_dedup: bool,
    /// Remote sessions stream; the engine must not retain delivered items.
    pub keep_all: bool,
}
