//! Distributed task definitions.
//!
//! - `TaskCategory`: how the scheduler classifies a stage task
//! - `TaskDescriptor`: everything needed to register one stage as a task
//! - `TaskRecord`: tracked state of a registered task

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::pipeline::StepKind;

/// Category a stage task is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    DataProcessing,
    QualityControl,
    Monitoring,
}

impl TaskCategory {
    /// Fixed stage to category mapping.
    pub fn for_step(kind: StepKind) -> Self {
        match kind {
            StepKind::Extraction | StepKind::Preprocessing => TaskCategory::DataProcessing,
            StepKind::Validation => TaskCategory::QualityControl,
            StepKind::Reporting => TaskCategory::Monitoring,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::DataProcessing => "data_processing",
            TaskCategory::QualityControl => "qc",
            TaskCategory::Monitoring => "monitor",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration data of one stage task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Task name, equal to the stage name.
    pub name: String,
    pub category: TaskCategory,
    /// Name of the artifact holding the stage's serialized output.
    pub return_value: String,
    /// Whether the scheduler may reuse a cached output. Always `false` for stages.
    pub cache: bool,
    pub project: String,
    pub queue: String,
}

impl TaskDescriptor {
    /// Builds the descriptor of a pipeline stage.
    pub fn for_step(kind: StepKind, project: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            name: kind.name().to_string(),
            category: TaskCategory::for_step(kind),
            return_value: format!("{}_return_value", kind.name()),
            cache: false,
            project: project.into(),
            queue: queue.into(),
        }
    }
}

/// Lifecycle state of a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        }
    }

    /// Whether a task in this state may move to `next`.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Queued, TaskState::Running)
                | (TaskState::Queued, TaskState::Failed)
                | (TaskState::Running, TaskState::Completed)
                | (TaskState::Running, TaskState::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracked state of a registered task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub descriptor: TaskDescriptor,
    pub state: TaskState,
    /// Serialized stage output, set on completion.
    #[serde(default)]
    pub return_value: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(descriptor: TaskDescriptor) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            descriptor,
            state: TaskState::Queued,
            return_value: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_categories() {
        assert_eq!(TaskCategory::for_step(StepKind::Extraction), TaskCategory::DataProcessing);
        assert_eq!(TaskCategory::for_step(StepKind::Preprocessing), TaskCategory::DataProcessing);
        assert_eq!(TaskCategory::for_step(StepKind::Validation), TaskCategory::QualityControl);
        assert_eq!(TaskCategory::for_step(StepKind::Reporting), TaskCategory::Monitoring);
    }

    #[test]
    fn test_descriptor_for_step() {
        let descriptor = TaskDescriptor::for_step(StepKind::Validation, "resumes", "default");
        assert_eq!(descriptor.name, "data_validating_step");
        assert_eq!(descriptor.return_value, "data_validating_step_return_value");
        assert!(!descriptor.cache);
        assert_eq!(descriptor.category, TaskCategory::QualityControl);
    }

    #[test]
    fn test_state_transitions() {
        assert!(TaskState::Queued.can_transition_to(TaskState::Running));
        assert!(TaskState::Running.can_transition_to(TaskState::Completed));
        assert!(TaskState::Queued.can_transition_to(TaskState::Failed));
        assert!(!TaskState::Queued.can_transition_to(TaskState::Completed));
        assert!(!TaskState::Completed.can_transition_to(TaskState::Running));
        assert!(TaskState::Failed.is_terminal());
    }
}
