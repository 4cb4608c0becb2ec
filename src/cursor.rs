use crate::closure::{Reducer, Transformer};
use crate::error::QueryResult;
use serde_json::Value;

/// A one-shot stream of query results produced by the engine.
///
/// `next` may block until the engine yields an item. `Ok(None)` signals exhaustion; it is not
/// an error and is terminal.
pub trait Cursor: Send {
    fn next(&mut self) -> QueryResult<Option<Value>>;
}

/// Adapts any in-memory iterator into a [`Cursor`].
pub struct IterCursor<I> {
    inner: I,
}

impl<I> IterCursor<I>
where
    I: Iterator<Item = Value> + Send,
{
    pub fn new(inner: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            inner: inner.into_iter(),
        }
    }
}

impl<I> Cursor for IterCursor<I>
where
    I: Iterator<Item = Value> + Send,
{
    fn next(&mut self) -> QueryResult<Option<Value>> {
        Ok(self.inner.next())
    }
}

/// How raw engine items are turned into the items paged back to the caller. Chosen once when
/// the query starts.
pub enum ItemPipeline {
    Raw,
    Reduce(Box<dyn Reducer>),
    Transform(Box<dyn Transformer>),
}

impl ItemPipeline {
    pub fn wrap(self, cursor: Box<dyn Cursor>) -> Box<dyn Cursor> {
        match self {
            Self::Raw => cursor,
            Self::Reduce(reducer) => Box::new(ReducingCursor {
                inner: cursor,
                reducer,
                emitted: false,
            }),
            Self::Transform(transformer) => Box::new(TransformingCursor {
                inner: cursor,
                transformer,
            }),
        }
    }
}

struct TransformingCursor {
    inner: Box<dyn Cursor>,
    transformer: Box<dyn Transformer>,
}

impl Cursor for TransformingCursor {
    fn next(&mut self) -> QueryResult<Option<Value>> {
        Ok(self.inner.next()?.map(|item| self.transformer.apply(item)))
    }
}

/// Drains the node-local stream through the reducer on first access and emits the single
/// reduced value.
struct ReducingCursor {
    inner: Box<dyn Cursor>,
    reducer: Box<dyn Reducer>,
    emitted: bool,
}

impl Cursor for ReducingCursor {
    fn next(&mut self) -> QueryResult<Option<Value>> {
        if self.emitted {
            return Ok(None);
        }
        while let Some(item) = self.inner.next()? {
            if !self.reducer.collect(item) {
                break;
            }
        }
        self.emitted = true;
        Ok(Some(self.reducer.reduce()))
    }
}
