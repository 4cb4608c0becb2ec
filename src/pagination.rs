use crate::cursor::Cursor;
use crate::error::{QueryError, QueryResult};
use crate::model::{ResultPage, SessionId};
use crate::session::SessionRecord;
use crate::store::SessionRegistry;
use std::sync::Arc;

// Page buffers are sized by the request but never preallocated beyond this.
const MAX_PREALLOC: usize = 1024;

/// Fetches the next page of the session registered under `id`.
pub fn fetch_page(
    registry: &dyn SessionRegistry,
    id: SessionId,
    page_size: usize,
) -> QueryResult<ResultPage> {
    let record = registry.get(id)?.ok_or(QueryError::SessionNotFound(id))?;
    next_page(registry, &record, page_size)
}

/// Pulls up to `page_size` items from the record's cursor.
///
/// The fetch that observes exhaustion marks the page `last` and retires the session with a
/// compare-and-remove against this exact record. A fetch that acquires the cursor after that
/// sees `SessionNotFound`, so exactly one page per session is ever terminal. A cursor error
/// retires the session too, since the cursor cannot be resumed.
pub(crate) fn next_page(
    registry: &dyn SessionRegistry,
    record: &Arc<SessionRecord>,
    page_size: usize,
) -> QueryResult<ResultPage> {
    let id = record.id();
    let mut state = record.cursor();
    if state.exhausted {
        return Err(QueryError::SessionNotFound(id));
    }

    let mut items = Vec::with_capacity(page_size.min(MAX_PREALLOC));
    let mut last = false;
    while items.len() < page_size {
        match state.cursor.next() {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {
                state.exhausted = true;
                last = true;
                break;
            }
            Err(err) => {
                state.exhausted = true;
                drop(state);
                retire(registry, record)?;
                tracing::warn!(session_id = %id, error = %err, "query cursor failed");
                return Err(err);
            }
        }
    }
    drop(state);

    if last {
        retire(registry, record)?;
    }
    tracing::debug!(session_id = %id, items = items.len(), last, "fetched query page");

    Ok(ResultPage {
        session_id: id,
        items,
        last,
    })
}

fn retire(registry: &dyn SessionRegistry, record: &Arc<SessionRecord>) -> QueryResult<()> {
    if registry.remove_if_same(record)? {
        tracing::info!(
            session_id = %record.id(),
            cache = record.cache_name(),
            "query session retired"
        );
    }
    Ok(())
}
