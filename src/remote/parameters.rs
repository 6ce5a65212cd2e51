//! Sources of externally supplied run parameters.
//!
//! A source returns the flat mapping of namespaced keys to typed values that
//! the override protocol applies before a remote run starts.

use std::path::PathBuf;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::debug;

use crate::config::overrides::RunParameters;
use crate::error::TrackerError;

/// Supplies the parameters of the current run.
#[async_trait]
pub trait RunParameterSource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<RunParameters>;
}

/// Fixed parameters, used for in-process runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRunParameters {
    parameters: RunParameters,
}

impl StaticRunParameters {
    pub fn new(parameters: RunParameters) -> Self {
        Self { parameters }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder method to add a parameter.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

#[async_trait]
impl RunParameterSource for StaticRunParameters {
    async fn fetch(&self) -> anyhow::Result<RunParameters> {
        Ok(self.parameters.clone())
    }
}

/// Parameters read from a JSON object file.
#[derive(Debug, Clone)]
pub struct FileRunParameters {
    path: PathBuf,
}

impl FileRunParameters {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RunParameterSource for FileRunParameters {
    async fn fetch(&self) -> anyhow::Result<RunParameters> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read run parameters {:?}: {}", self.path, e)
        })?;
        let parameters: RunParameters = serde_json::from_str(&content)?;
        debug!(path = ?self.path, count = parameters.len(), "Run parameters loaded");
        Ok(parameters)
    }
}

/// Parameters stored in a Redis hash of JSON-encoded values.
pub struct RedisRunParameters {
    redis: ConnectionManager,
    key: String,
}

impl RedisRunParameters {
    pub async fn connect(redis_url: &str, key: &str) -> Result<Self, TrackerError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self {
            redis,
            key: key.to_string(),
        })
    }
}

/// Decodes raw hash entries. A value that is not valid JSON is kept as a string.
pub fn decode_hash_entries(entries: Vec<(String, String)>) -> RunParameters {
    entries
        .into_iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            (key, value)
        })
        .collect()
}

#[async_trait]
impl RunParameterSource for RedisRunParameters {
    async fn fetch(&self) -> anyhow::Result<RunParameters> {
        let mut conn = self.redis.clone();
        let entries: Vec<(String, String)> = conn.hgetall(&self.key).await?;
        let parameters = decode_hash_entries(entries);
        debug!(key = %self.key, count = parameters.len(), "Run parameters fetched from Redis");
        Ok(parameters)
    }
}
