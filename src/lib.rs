#![forbid(unsafe_code)]

pub mod broadcast;
pub mod closure;
pub mod cluster;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod handler;
pub mod inmemory;
pub mod model;
pub mod node;
pub mod pagination;
pub mod router;
pub mod session;
pub mod store;
pub mod transport;

pub use broadcast::{AdminAction, BroadcastCoordinator};
pub use closure::{ArgType, Capability, ClosureFactory, ClosureInstance, ClosureType};
pub use cluster::ClusterView;
pub use config::{create_session_registry, QueryNodeConfig, RegistryConfig};
pub use cursor::{Cursor, IterCursor};
pub use engine::{QueryEngine, QuerySpec};
pub use error::{ErrorCode, QueryError, QueryResult};
pub use handler::{CommandName, FetchRequest, QueryCommand, QueryCommandHandler, QueryResponse};
pub use model::{Ack, ClosureSpec, NodeId, QueryKind, QueryRequest, ResultPage, SessionId};
pub use node::LocalNode;
pub use router::{ExecutionTarget, Router};
pub use store::SessionRegistry;
pub use transport::{InProcessTransport, NodeTransport};
