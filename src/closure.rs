use crate::error::{BoxError, QueryError, QueryResult};
use crate::model::ClosureSpec;
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Filters scan results by entry key and value.
pub trait ScanPredicate: Send + Sync {
    fn apply(&self, key: &Value, value: &Value) -> bool;
}

/// Folds a node-local result stream into a single partial result.
pub trait Reducer: Send {
    /// Accepts the next item; returning `false` stops collection early.
    fn collect(&mut self, item: Value) -> bool;

    fn reduce(&mut self) -> Value;
}

/// Maps every result item before it is paged back to the caller.
pub trait Transformer: Send {
    fn apply(&self, item: Value) -> Value;
}

/// Contract a named closure type must fulfil to be used in a given position of a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Predicate,
    Reducer,
    Transformer,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Predicate => "predicate",
            Self::Reducer => "reducer",
            Self::Transformer => "transformer",
        };
        f.write_str(name)
    }
}

/// A constructed closure, tagged by the capability it provides.
pub enum ClosureInstance {
    Predicate(Box<dyn ScanPredicate>),
    Reducer(Box<dyn Reducer>),
    Transformer(Box<dyn Transformer>),
}

impl ClosureInstance {
    pub fn predicate(predicate: impl ScanPredicate + 'static) -> Self {
        Self::Predicate(Box::new(predicate))
    }

    pub fn reducer(reducer: impl Reducer + 'static) -> Self {
        Self::Reducer(Box::new(reducer))
    }

    pub fn transformer(transformer: impl Transformer + 'static) -> Self {
        Self::Transformer(Box::new(transformer))
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::Predicate(_) => Capability::Predicate,
            Self::Reducer(_) => Capability::Reducer,
            Self::Transformer(_) => Capability::Transformer,
        }
    }
}

impl fmt::Debug for ClosureInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClosureInstance")
            .field(&self.capability())
            .finish()
    }
}

/// Declared type of a constructor parameter, checked against the runtime type of each argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgType {
    Any,
    Bool,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl ArgType {
    /// `null` is accepted by every parameter type.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (Self::Any, _) => true,
            (Self::Bool, Value::Bool(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Number, Value::Number(_)) => true,
            (Self::String, Value::String(_)) => true,
            (Self::Array, Value::Array(_)) => true,
            (Self::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

type BuildFn = Arc<dyn Fn(&[Value]) -> Result<ClosureInstance, BoxError> + Send + Sync>;

#[derive(Clone)]
struct Constructor {
    params: Vec<ArgType>,
    visibility: Visibility,
    build: BuildFn,
}

impl Constructor {
    fn matches(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| param.accepts(arg))
    }
}

/// A loadable closure type: its name, the capability it provides and its constructors.
#[derive(Clone)]
pub struct ClosureType {
    class_name: String,
    capability: Capability,
    constructors: Vec<Constructor>,
}

impl ClosureType {
    pub fn new(class_name: impl Into<String>, capability: Capability) -> Self {
        Self {
            class_name: class_name.into(),
            capability,
            constructors: Vec::new(),
        }
    }

    /// Adds a public constructor. Constructors are tried in registration order.
    pub fn constructor<F>(self, params: &[ArgType], build: F) -> Self
    where
        F: Fn(&[Value]) -> Result<ClosureInstance, BoxError> + Send + Sync + 'static,
    {
        self.with_constructor(params, Visibility::Public, build)
    }

    pub fn with_constructor<F>(mut self, params: &[ArgType], visibility: Visibility, build: F) -> Self
    where
        F: Fn(&[Value]) -> Result<ClosureInstance, BoxError> + Send + Sync + 'static,
    {
        self.constructors.push(Constructor {
            params: params.to_vec(),
            visibility,
            build: Arc::new(build),
        });
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }
}

/// Builds caller-named predicates, reducers and transformers at the executing node.
///
/// Types must be registered up front; a lookup never falls back to anything but the registered
/// constructors. Every call produces a fresh instance.
#[derive(Default)]
pub struct ClosureFactory {
    types: DashMap<String, Arc<ClosureType>>,
}

impl ClosureFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a closure type under its class name.
    pub fn register(&self, closure_type: ClosureType) {
        tracing::debug!(
            class_name = %closure_type.class_name,
            capability = %closure_type.capability,
            constructors = closure_type.constructors.len(),
            "registered closure type"
        );
        self.types
            .insert(closure_type.class_name.clone(), Arc::new(closure_type));
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.types.contains_key(class_name)
    }

    pub fn construct(
        &self,
        capability: Capability,
        class_name: &str,
        args: &[Value],
    ) -> QueryResult<ClosureInstance> {
        let closure_type = self
            .types
            .get(class_name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| QueryError::TargetTypeNotFound {
                class_name: class_name.to_string(),
            })?;

        if closure_type.capability != capability {
            return Err(QueryError::CapabilityNotSatisfied {
                capability: capability.to_string(),
                class_name: class_name.to_string(),
            });
        }

        let ctor = closure_type
            .constructors
            .iter()
            .find(|ctor| ctor.matches(args))
            .ok_or_else(|| QueryError::NoMatchingConstructor {
                class_name: class_name.to_string(),
                args: Value::Array(args.to_vec()).to_string(),
            })?;

        if ctor.visibility != Visibility::Public {
            return Err(QueryError::AccessDenied {
                class_name: class_name.to_string(),
            });
        }

        let instance = (ctor.build)(args).map_err(|cause| QueryError::ConstructionFailed {
            class_name: class_name.to_string(),
            cause,
        })?;

        if instance.capability() != capability {
            return Err(QueryError::ConstructionFailed {
                class_name: class_name.to_string(),
                cause: format!(
                    "constructor produced a {} instead of a {capability}",
                    instance.capability()
                )
                .into(),
            });
        }
        Ok(instance)
    }

    pub fn predicate(&self, spec: &ClosureSpec) -> QueryResult<Box<dyn ScanPredicate>> {
        match self.construct(Capability::Predicate, &spec.class_name, &spec.args)? {
            ClosureInstance::Predicate(predicate) => Ok(predicate),
            other => Err(mismatch(&spec.class_name, Capability::Predicate, &other)),
        }
    }

    pub fn reducer(&self, spec: &ClosureSpec) -> QueryResult<Box<dyn Reducer>> {
        match self.construct(Capability::Reducer, &spec.class_name, &spec.args)? {
            ClosureInstance::Reducer(reducer) => Ok(reducer),
            other => Err(mismatch(&spec.class_name, Capability::Reducer, &other)),
        }
    }

    pub fn transformer(&self, spec: &ClosureSpec) -> QueryResult<Box<dyn Transformer>> {
        match self.construct(Capability::Transformer, &spec.class_name, &spec.args)? {
            ClosureInstance::Transformer(transformer) => Ok(transformer),
            other => Err(mismatch(&spec.class_name, Capability::Transformer, &other)),
        }
    }
}

fn mismatch(class_name: &str, expected: Capability, got: &ClosureInstance) -> QueryError {
    QueryError::ConstructionFailed {
        class_name: class_name.to_string(),
        cause: format!("expected {expected}, got {}", got.capability()).into(),
    }
}
