//! Periodic run registration.
//!
//! A [`ScheduleRecord`] tells the scheduler service when to launch the
//! pipeline and on which queue. Registering again under the same pipeline
//! name replaces the earlier record.
//!
//! # Redis layout
//!
//! - `{project}:schedule:{pipeline}`: hash with `record` and `updated_at`
//! - `{scheduler_queue}`: list the scheduler service picks new records from (LPUSH)

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ConfigError, RemoteConfig, ScheduleConfig};
use crate::error::{PipelineError, TrackerError};

/// Registration of a periodic pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub id: Uuid,
    /// Name of the scheduler task.
    pub name: String,
    pub pipeline: String,
    pub project: String,
    /// Queue each scheduled run is dispatched to.
    pub queue: String,
    pub schedule: ScheduleConfig,
    pub created_at: DateTime<Utc>,
}

impl ScheduleRecord {
    pub fn new(
        pipeline: impl Into<String>,
        project: impl Into<String>,
        queue: impl Into<String>,
        schedule: ScheduleConfig,
    ) -> Self {
        let pipeline = pipeline.into();
        Self {
            id: Uuid::new_v4(),
            name: format!("Scheduled report run: {}", pipeline),
            pipeline,
            project: project.into(),
            queue: queue.into(),
            schedule,
            created_at: Utc::now(),
        }
    }

    /// Builds the record from the remote settings.
    ///
    /// # Errors
    ///
    /// `ConfigError::MissingParameter` when the settings carry no `schedule`
    /// section, or the validation error of an invalid one.
    pub fn from_remote(default_pipeline: &str, remote: &RemoteConfig) -> Result<Self, ConfigError> {
        let schedule = remote
            .schedule
            .clone()
            .ok_or_else(|| ConfigError::MissingParameter("schedule".to_string()))?;
        schedule.validate()?;

        Ok(Self::new(
            remote.pipeline_name_or(default_pipeline),
            &remote.project,
            &remote.queue,
            schedule,
        ))
    }
}

/// Stores schedule registrations for the scheduler service.
#[async_trait]
pub trait ScheduleRegistry: Send + Sync {
    async fn register(&self, record: &ScheduleRecord) -> Result<(), TrackerError>;
}

/// Builds the record from `remote` and registers it.
pub async fn register_schedule(
    registry: &dyn ScheduleRegistry,
    default_pipeline: &str,
    remote: &RemoteConfig,
) -> Result<ScheduleRecord, PipelineError> {
    let record = ScheduleRecord::from_remote(default_pipeline, remote)?;
    registry.register(&record).await?;
    info!(
        pipeline = %record.pipeline,
        queue = %record.queue,
        scheduler_queue = %record.schedule.scheduler_queue,
        "Schedule registered"
    );
    Ok(record)
}

/// Process-local registry, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryScheduleRegistry {
    records: Mutex<Vec<ScheduleRecord>>,
}

impl InMemoryScheduleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ScheduleRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ScheduleRegistry for InMemoryScheduleRegistry {
    async fn register(&self, record: &ScheduleRecord) -> Result<(), TrackerError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.retain(|r| r.pipeline != record.pipeline);
        records.push(record.clone());
        debug!(pipeline = %record.pipeline, "Schedule stored in memory");
        Ok(())
    }
}

/// Redis-backed registry.
pub struct RedisScheduleRegistry {
    redis: ConnectionManager,
}

impl RedisScheduleRegistry {
    pub async fn connect(redis_url: &str) -> Result<Self, TrackerError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self { redis })
    }

    pub fn from_connection(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

/// Key of the hash holding the schedule of `pipeline`.
pub fn schedule_key(project: &str, pipeline: &str) -> String {
    format!("{}:schedule:{}", project, pipeline)
}

#[async_trait]
impl ScheduleRegistry for RedisScheduleRegistry {
    async fn register(&self, record: &ScheduleRecord) -> Result<(), TrackerError> {
        let serialized = serde_json::to_string(record)?;
        let key = schedule_key(&record.project, &record.pipeline);
        let mut conn = self.redis.clone();

        let mut pipe = redis::pipe();
        pipe.hset(&key, "record", &serialized)
            .hset(&key, "updated_at", record.created_at.to_rfc3339())
            .lpush(&record.schedule.scheduler_queue, &serialized);
        pipe.query_async::<_, ()>(&mut conn).await?;

        debug!(key = %key, "Schedule stored in Redis");
        Ok(())
    }
}
