use crate::model::{NodeId, SessionId};
use thiserror::Error;

pub type QueryResult<T> = Result<T, QueryError>;

/// Boxed cause reported by user-supplied constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification shared by every [`QueryError`], suitable for mapping onto transport
/// status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Unavailable,
    NotFound,
    InvalidInput,
    Unimplemented,
    PermissionDenied,
    Internal,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("destination node has left the cluster (retry the query) [node={node}, cache={cache}]")]
    UnreachableDestination { node: NodeId, cache: String },

    #[error("failed to find query session (query has been expired or fully fetched) [session={0}]")]
    SessionNotFound(SessionId),

    #[error("unsupported query type: {0}")]
    UnsupportedQueryKind(String),

    #[error("failed to find target type: {class_name}")]
    TargetTypeNotFound { class_name: String },

    #[error(
        "failed to create instance (target type does not provide required capability) \
         [capability={capability}, class_name={class_name}]"
    )]
    CapabilityNotSatisfied {
        capability: String,
        class_name: String,
    },

    #[error("failed to find constructor for provided arguments [class_name={class_name}, args={args}]")]
    NoMatchingConstructor { class_name: String, args: String },

    #[error("failed to instantiate type (constructor failed) [class_name={class_name}]: {cause}")]
    ConstructionFailed {
        class_name: String,
        #[source]
        cause: BoxError,
    },

    #[error("failed to instantiate type (constructor is not accessible) [class_name={class_name}]")]
    AccessDenied { class_name: String },

    #[error("remote execution failed [node={node}]: {cause}")]
    RemoteExecutionFailed { node: NodeId, cause: Box<QueryError> },

    #[error("unsupported query command: {0}")]
    UnsupportedCommand(String),

    #[error("no cluster node hosts cache [cache={0}]")]
    NoCacheNodes(String),

    #[error("session id collision on insert (generator invariant violated) [session={0}]")]
    SessionIdCollision(SessionId),

    #[error("query engine failure [cache={cache}]: {message}")]
    Engine {
        code: ErrorCode,
        cache: String,
        message: String,
    },

    #[error("transport failure [node={node}]: {message}")]
    Transport { node: NodeId, message: String },

    #[error("query worker did not complete: {0}")]
    Worker(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl QueryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnreachableDestination { .. } | Self::Transport { .. } => ErrorCode::Unavailable,
            Self::SessionNotFound(_) | Self::TargetTypeNotFound { .. } | Self::NoCacheNodes(_) => {
                ErrorCode::NotFound
            }
            Self::CapabilityNotSatisfied { .. }
            | Self::NoMatchingConstructor { .. }
            | Self::InvalidRequest(_) => ErrorCode::InvalidInput,
            Self::UnsupportedQueryKind(_) | Self::UnsupportedCommand(_) => {
                ErrorCode::Unimplemented
            }
            Self::AccessDenied { .. } => ErrorCode::PermissionDenied,
            Self::RemoteExecutionFailed { cause, .. } => cause.code(),
            Self::Engine { code, .. } => *code,
            Self::ConstructionFailed { .. } | Self::SessionIdCollision(_) | Self::Worker(_) => {
                ErrorCode::Internal
            }
        }
    }

    /// Only a departed destination is worth resubmitting, and the whole query must be re-issued.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UnreachableDestination { .. })
    }

    /// Implementation bugs that must never be retried or masked.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::SessionIdCollision(_) => true,
            Self::RemoteExecutionFailed { cause, .. } => cause.is_fatal(),
            _ => false,
        }
    }

    /// Convenience for engines reporting failures against a cache.
    pub fn engine(code: ErrorCode, cache: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            code,
            cache: cache.into(),
            message: message.into(),
        }
    }

    pub(crate) fn remote(node: NodeId, cause: QueryError) -> Self {
        match cause {
            // Already attributed to a node further down the call chain.
            already @ Self::RemoteExecutionFailed { .. } => already,
            cause => Self::RemoteExecutionFailed {
                node,
                cause: Box::new(cause),
            },
        }
    }
}

pub(crate) fn serde_error(err: serde_json::Error) -> QueryError {
    QueryError::InvalidRequest(err.to_string())
}
