use crate::cursor::Cursor;
use crate::model::SessionId;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

/// Cursor plus the flag recording that it has reported exhaustion.
pub struct CursorState {
    pub(crate) cursor: Box<dyn Cursor>,
    pub(crate) exhausted: bool,
}

/// Node-local registration of a running query.
///
/// Records are shared as `Arc<SessionRecord>`; registry removal compares by pointer identity,
/// never by id alone.
pub struct SessionRecord {
    id: SessionId,
    cache_name: String,
    started_at: OffsetDateTime,
    last_use: Mutex<Instant>,
    state: Mutex<CursorState>,
}

impl SessionRecord {
    pub fn new(id: SessionId, cache_name: impl Into<String>, cursor: Box<dyn Cursor>) -> Arc<Self> {
        Arc::new(Self {
            id,
            cache_name: cache_name.into(),
            started_at: OffsetDateTime::now_utc(),
            last_use: Mutex::new(Instant::now()),
            state: Mutex::new(CursorState {
                cursor,
                exhausted: false,
            }),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub fn last_use(&self) -> Instant {
        *self.last_use.lock()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_use().elapsed()
    }

    /// Locks the cursor for exclusive advancement and refreshes the last-use timestamp.
    pub(crate) fn cursor(&self) -> MutexGuard<'_, CursorState> {
        *self.last_use.lock() = Instant::now();
        self.state.lock()
    }
}

impl fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecord")
            .field("id", &self.id)
            .field("cache_name", &self.cache_name)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}
