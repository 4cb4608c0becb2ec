use crate::error::QueryResult;
use crate::model::SessionId;
use crate::session::SessionRecord;
use std::sync::Arc;
use std::time::Duration;

/// Node-local registry of live query sessions.
///
/// The registry is the only structure shared between concurrent request workers on a node.
/// Implementations must make every operation atomic with respect to the others.
pub trait SessionRegistry: Send + Sync + 'static {
    /// Registers a freshly created record. An existing entry under the same id is never
    /// replaced and yields [`QueryError::SessionIdCollision`](crate::error::QueryError).
    fn insert_if_absent(&self, record: Arc<SessionRecord>) -> QueryResult<()>;

    /// Looks up the record registered under `id`, if any.
    fn get(&self, id: SessionId) -> QueryResult<Option<Arc<SessionRecord>>>;

    /// Removes the entry for `record.id()` only while it still maps to this exact record.
    /// Returns whether the entry was removed.
    fn remove_if_same(&self, record: &Arc<SessionRecord>) -> QueryResult<bool>;

    /// Records not touched for at least `max_idle`, for an external sweeper to retire through
    /// [`remove_if_same`](Self::remove_if_same).
    fn idle_since(&self, max_idle: Duration) -> QueryResult<Vec<Arc<SessionRecord>>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
