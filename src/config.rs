use crate::error::{serde_error, QueryError, QueryResult};
use crate::inmemory::InMemorySessionRegistry;
use crate::store::SessionRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: usize = 1024;

const ENV_DEFAULT_PAGE_SIZE: &str = "CACHE_QUERY_DEFAULT_PAGE_SIZE";
const ENV_MAX_PAGE_SIZE: &str = "CACHE_QUERY_MAX_PAGE_SIZE";
const ENV_DEFAULT_TIMEOUT_MS: &str = "CACHE_QUERY_DEFAULT_TIMEOUT_MS";

/// Per-node defaults applied to incoming query commands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryNodeConfig {
    pub default_page_size: usize,
    pub max_page_size: Option<usize>,
    /// Zero disables the default timeout.
    pub default_timeout_ms: u64,
}

impl Default for QueryNodeConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: None,
            default_timeout_ms: 0,
        }
    }
}

impl QueryNodeConfig {
    pub fn from_json_str(raw: &str) -> QueryResult<Self> {
        let config: Self = serde_json::from_str(raw).map_err(serde_error)?;
        config.validate()
    }

    /// Reads overrides from `CACHE_QUERY_*` environment variables on top of the defaults.
    pub fn from_env() -> QueryResult<Self> {
        let mut config = Self::default();
        if let Some(size) = env_number(ENV_DEFAULT_PAGE_SIZE)? {
            config.default_page_size = size as usize;
        }
        if let Some(size) = env_number(ENV_MAX_PAGE_SIZE)? {
            config.max_page_size = Some(size as usize);
        }
        if let Some(ms) = env_number(ENV_DEFAULT_TIMEOUT_MS)? {
            config.default_timeout_ms = ms;
        }
        config.validate()
    }

    fn validate(self) -> QueryResult<Self> {
        if self.default_page_size == 0 {
            return Err(QueryError::InvalidRequest(
                "default page size must be positive".into(),
            ));
        }
        if self.max_page_size == Some(0) {
            return Err(QueryError::InvalidRequest(
                "max page size must be positive".into(),
            ));
        }
        Ok(self)
    }

    /// Resolves a requested page size: zero selects the default, and the cap applies last.
    pub fn page_size(&self, requested: u32) -> usize {
        let size = match requested {
            0 => self.default_page_size,
            n => n as usize,
        };
        match self.max_page_size {
            Some(max) => size.min(max),
            None => size,
        }
    }

    pub fn timeout(&self, requested_ms: u64) -> Option<Duration> {
        match (requested_ms, self.default_timeout_ms) {
            (0, 0) => None,
            (0, default) => Some(Duration::from_millis(default)),
            (ms, _) => Some(Duration::from_millis(ms)),
        }
    }
}

fn env_number(name: &str) -> QueryResult<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| QueryError::InvalidRequest(format!("{name}={raw:?}: {err}"))),
        Err(_) => Ok(None),
    }
}

/// Selects the session registry implementation for a node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RegistryConfig {
    #[default]
    InMemory,
    /// In-memory with an explicit shard count (power of two, greater than one).
    InMemorySharded(usize),
}

pub fn create_session_registry(config: RegistryConfig) -> QueryResult<Arc<dyn SessionRegistry>> {
    match config {
        RegistryConfig::InMemory => Ok(Arc::new(InMemorySessionRegistry::new())),
        RegistryConfig::InMemorySharded(shards) => {
            if shards < 2 || !shards.is_power_of_two() {
                return Err(QueryError::InvalidRequest(format!(
                    "registry shard amount must be a power of two greater than one, got {shards}"
                )));
            }
            Ok(Arc::new(InMemorySessionRegistry::with_shard_amount(shards)))
        }
    }
}
