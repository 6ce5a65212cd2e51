//! Task tracking backends.
//!
//! A [`TaskTracker`] records the lifecycle of every stage task of a remote
//! run and stores the artifacts published along the way.
//!
//! # Redis layout
//!
//! - `{queue}`: list of dispatched task records (LPUSH)
//! - `{project}:task:{id}`: hash with `state`, `record` and `updated_at`
//! - `{project}:artifacts:{owner}`: hash of artifact name to JSON value

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::TrackerError;

use super::task::{TaskDescriptor, TaskRecord, TaskState};

/// Records the lifecycle of remote stage tasks.
#[async_trait]
pub trait TaskTracker: Send + Sync {
    /// Registers a task in the queued state and returns its id.
    async fn register(&self, descriptor: &TaskDescriptor) -> Result<Uuid, TrackerError>;

    async fn mark_running(&self, task_id: Uuid) -> Result<(), TrackerError>;

    /// Marks the task completed and stores its serialized return value.
    async fn complete(&self, task_id: Uuid, return_value: Value) -> Result<(), TrackerError>;

    async fn fail(&self, task_id: Uuid, reason: &str) -> Result<(), TrackerError>;

    /// Stores a named artifact under `owner` (a task id or a run scope).
    async fn publish_artifact(
        &self,
        owner: &str,
        name: &str,
        value: Value,
    ) -> Result<(), TrackerError>;
}

fn transition(record: &mut TaskRecord, next: TaskState) -> Result<(), TrackerError> {
    if !record.state.can_transition_to(next) {
        return Err(TrackerError::InvalidTransition {
            task: record.id.to_string(),
            from: record.state.to_string(),
            to: next.to_string(),
        });
    }
    record.state = next;
    record.updated_at = Utc::now();
    Ok(())
}

/// Process-local tracker, used when a remote pipeline executes in-process
/// and in tests.
#[derive(Debug, Default)]
pub struct InMemoryTaskTracker {
    records: Mutex<Vec<TaskRecord>>,
    artifacts: Mutex<HashMap<String, Vec<(String, Value)>>>,
}

impl InMemoryTaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all task records in registration order.
    pub fn records(&self) -> Vec<TaskRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Artifacts published under `owner`, in publication order.
    pub fn artifacts(&self, owner: &str) -> Vec<(String, Value)> {
        self.artifacts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }

    fn update<F>(&self, task_id: Uuid, apply: F) -> Result<(), TrackerError>
    where
        F: FnOnce(&mut TaskRecord) -> Result<(), TrackerError>,
    {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let record = records
            .iter_mut()
            .find(|r| r.id == task_id)
            .ok_or_else(|| TrackerError::TaskNotFound(task_id.to_string()))?;
        apply(record)
    }
}

#[async_trait]
impl TaskTracker for InMemoryTaskTracker {
    async fn register(&self, descriptor: &TaskDescriptor) -> Result<Uuid, TrackerError> {
        let record = TaskRecord::new(descriptor.clone());
        let id = record.id;
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        debug!(task = %descriptor.name, task_id = %id, "Task registered");
        Ok(id)
    }

    async fn mark_running(&self, task_id: Uuid) -> Result<(), TrackerError> {
        self.update(task_id, |record| transition(record, TaskState::Running))
    }

    async fn complete(&self, task_id: Uuid, return_value: Value) -> Result<(), TrackerError> {
        self.update(task_id, |record| {
            transition(record, TaskState::Completed)?;
            record.return_value = Some(return_value);
            Ok(())
        })
    }

    async fn fail(&self, task_id: Uuid, reason: &str) -> Result<(), TrackerError> {
        self.update(task_id, |record| {
            transition(record, TaskState::Failed)?;
            record.error = Some(reason.to_string());
            Ok(())
        })
    }

    async fn publish_artifact(
        &self,
        owner: &str,
        name: &str,
        value: Value,
    ) -> Result<(), TrackerError> {
        self.artifacts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(owner.to_string())
            .or_default()
            .push((name.to_string(), value));
        Ok(())
    }
}

/// Redis-backed tracker.
///
/// Registered tasks are pushed onto the execution queue so external workers
/// and dashboards can follow the run.
pub struct RedisTaskTracker {
    redis: ConnectionManager,
    project: String,
    queue: String,
}

impl RedisTaskTracker {
    /// Connects to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `project` - Prefix of the task and artifact keys
    /// * `queue` - List the task records are pushed to
    pub async fn connect(redis_url: &str, project: &str, queue: &str) -> Result<Self, TrackerError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self::from_connection(redis, project, queue))
    }

    pub fn from_connection(redis: ConnectionManager, project: &str, queue: &str) -> Self {
        Self {
            redis,
            project: project.to_string(),
            queue: queue.to_string(),
        }
    }

    fn task_key(&self, task_id: Uuid) -> String {
        format!("{}:task:{}", self.project, task_id)
    }

    fn artifacts_key(&self, owner: &str) -> String {
        format!("{}:artifacts:{}", self.project, owner)
    }

    async fn load(&self, task_id: Uuid) -> Result<TaskRecord, TrackerError> {
        let mut conn = self.redis.clone();
        let data: Option<String> = conn.hget(self.task_key(task_id), "record").await?;
        let data = data.ok_or_else(|| TrackerError::TaskNotFound(task_id.to_string()))?;
        Ok(serde_json::from_str(&data)?)
    }

    async fn store(&self, record: &TaskRecord) -> Result<(), TrackerError> {
        let serialized = serde_json::to_string(record)?;
        let mut conn = self.redis.clone();

        let mut pipe = redis::pipe();
        pipe.hset(self.task_key(record.id), "state", record.state.as_str())
            .hset(self.task_key(record.id), "record", &serialized)
            .hset(
                self.task_key(record.id),
                "updated_at",
                record.updated_at.to_rfc3339(),
            );
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn advance<F>(&self, task_id: Uuid, apply: F) -> Result<(), TrackerError>
    where
        F: FnOnce(&mut TaskRecord) -> Result<(), TrackerError> + Send,
    {
        let mut record = self.load(task_id).await?;
        apply(&mut record)?;
        self.store(&record).await
    }
}

#[async_trait]
impl TaskTracker for RedisTaskTracker {
    async fn register(&self, descriptor: &TaskDescriptor) -> Result<Uuid, TrackerError> {
        let record = TaskRecord::new(descriptor.clone());
        self.store(&record).await?;

        let serialized = serde_json::to_string(&record)?;
        let mut conn = self.redis.clone();
        conn.lpush::<_, _, ()>(&self.queue, serialized).await?;

        debug!(task = %descriptor.name, task_id = %record.id, queue = %self.queue, "Task registered");
        Ok(record.id)
    }

    async fn mark_running(&self, task_id: Uuid) -> Result<(), TrackerError> {
        self.advance(task_id, |record| transition(record, TaskState::Running))
            .await
    }

    async fn complete(&self, task_id: Uuid, return_value: Value) -> Result<(), TrackerError> {
        self.advance(task_id, |record| {
            transition(record, TaskState::Completed)?;
            record.return_value = Some(return_value);
            Ok(())
        })
        .await
    }

    async fn fail(&self, task_id: Uuid, reason: &str) -> Result<(), TrackerError> {
        let reason = reason.to_string();
        let result = self
            .advance(task_id, |record| {
                transition(record, TaskState::Failed)?;
                record.error = Some(reason);
                Ok(())
            })
            .await;
        if let Err(e) = &result {
            warn!(task_id = %task_id, error = %e, "Failed to record task failure");
        }
        result
    }

    async fn publish_artifact(
        &self,
        owner: &str,
        name: &str,
        value: Value,
    ) -> Result<(), TrackerError> {
        let serialized = serde_json::to_string(&value)?;
        let mut conn = self.redis.clone();
        conn.hset::<_, _, _, ()>(self.artifacts_key(owner), name, serialized)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StepKind;
    use serde_json::json;

    fn descriptor() -> TaskDescriptor {
        TaskDescriptor::for_step(StepKind::Extraction, "resumes", "default")
    }

    #[tokio::test]
    async fn test_in_memory_lifecycle() {
        let tracker = InMemoryTaskTracker::new();
        let id = tracker.register(&descriptor()).await.unwrap();

        tracker.mark_running(id).await.unwrap();
        tracker
            .complete(id, json!({"result": {"source_data": "source_data"}}))
            .await
            .unwrap();

        let records = tracker.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, TaskState::Completed);
        assert!(records[0].return_value.is_some());
    }

    #[tokio::test]
    async fn test_in_memory_rejects_invalid_transition() {
        let tracker = InMemoryTaskTracker::new();
        let id = tracker.register(&descriptor()).await.unwrap();

        let err = tracker.complete(id, json!(null)).await.unwrap_err();
        assert!(matches!(err, TrackerError::InvalidTransition { .. }));

        tracker.fail(id, "worker lost").await.unwrap();
        assert_eq!(tracker.records()[0].error.as_deref(), Some("worker lost"));
    }

    #[tokio::test]
    async fn test_in_memory_unknown_task() {
        let tracker = InMemoryTaskTracker::new();
        let err = tracker.mark_running(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, TrackerError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_in_memory_artifacts() {
        let tracker = InMemoryTaskTracker::new();
        tracker
            .publish_artifact("run", "summary", json!({"rows": 3}))
            .await
            .unwrap();

        assert_eq!(
            tracker.artifacts("run"),
            vec![("summary".to_string(), json!({"rows": 3}))]
        );
        assert!(tracker.artifacts("other").is_empty());
    }
}
