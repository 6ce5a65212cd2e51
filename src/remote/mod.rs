//! Remote (distributed) execution backend.
//!
//! Each pipeline stage of a remote run becomes a tracked task:
//!
//! - **task**: task descriptors, categories and lifecycle records
//! - **tracker**: `TaskTracker` backends (in-memory and Redis)
//! - **parameters**: sources of the run parameters applied as configuration
//!   overrides before the run starts
//! - **schedule**: periodic run registrations read by the scheduler service
//!
//! # Example
//!
//! ```ignore
//! use resume_pipeline::remote::{RedisTaskTracker, RedisRunParameters};
//!
//! let tracker = RedisTaskTracker::connect("redis://localhost:6379", "resumes", "default").await?;
//! let parameters = RedisRunParameters::connect("redis://localhost:6379", "run_parameters").await?;
//! ```

pub mod parameters;
pub mod schedule;
pub mod task;
pub mod tracker;

pub use parameters::{
    FileRunParameters, RedisRunParameters, RunParameterSource, StaticRunParameters,
};
pub use schedule::{
    register_schedule, schedule_key, InMemoryScheduleRegistry, RedisScheduleRegistry,
    ScheduleRecord, ScheduleRegistry,
};
pub use task::{TaskCategory, TaskDescriptor, TaskRecord, TaskState};
pub use tracker::{InMemoryTaskTracker, RedisTaskTracker, TaskTracker};
