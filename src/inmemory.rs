use crate::error::{QueryError, QueryResult};
use crate::model::SessionId;
use crate::session::SessionRecord;
use crate::store::SessionRegistry;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// In-memory registry backed by a sharded concurrent hash map.
pub struct InMemorySessionRegistry {
    entries: DashMap<SessionId, Arc<SessionRecord>>,
}

impl Default for InMemorySessionRegistry {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl InMemorySessionRegistry {
    /// Constructs a registry with no background maintenance. Idle sessions stay until an
    /// external sweeper removes them.
    pub fn new() -> Self {
        Self::default()
    }

    /// `shard_amount` must be a power of two greater than one.
    pub fn with_shard_amount(shard_amount: usize) -> Self {
        Self {
            entries: DashMap::with_shard_amount(shard_amount),
        }
    }
}

impl SessionRegistry for InMemorySessionRegistry {
    fn insert_if_absent(&self, record: Arc<SessionRecord>) -> QueryResult<()> {
        let id = record.id();
        match self.entries.entry(id) {
            Entry::Occupied(_) => {
                tracing::error!(session_id = %id, "session id collision on insert");
                Err(QueryError::SessionIdCollision(id))
            }
            Entry::Vacant(vac) => {
                vac.insert(record);
                Ok(())
            }
        }
    }

    fn get(&self, id: SessionId) -> QueryResult<Option<Arc<SessionRecord>>> {
        // Clone the Arc out so the shard lock is not held while the cursor is advanced.
        Ok(self.entries.get(&id).map(|entry| Arc::clone(entry.value())))
    }

    fn remove_if_same(&self, record: &Arc<SessionRecord>) -> QueryResult<bool> {
        Ok(self
            .entries
            .remove_if(&record.id(), |_, current| Arc::ptr_eq(current, record))
            .is_some())
    }

    fn idle_since(&self, max_idle: Duration) -> QueryResult<Vec<Arc<SessionRecord>>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.value().idle_for() >= max_idle)
            .map(|entry| Arc::clone(entry.value()))
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
