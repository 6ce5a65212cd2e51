//! YAML configuration loading.
//!
//! Two files drive a run: the pipeline configuration (stages and datasets)
//! and the remote settings used by the distributed backend.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::PipelineConfiguration;
use super::ConfigError;

/// Default location of the pipeline configuration.
pub const DEFAULT_PIPELINE_CONFIG_PATH: &str = "config/pipeline.yaml";

/// Default location of the remote backend settings.
pub const DEFAULT_REMOTE_CONFIG_PATH: &str = "config/remote.yaml";

/// Settings of the remote (distributed) backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Project under which stage tasks are registered.
    pub project: String,
    /// Name the pipeline is registered under. Defaults to `common_properties.name`.
    #[serde(default)]
    pub pipeline_name: Option<String>,
    /// Queue stage tasks are dispatched to.
    #[serde(default = "default_queue")]
    pub queue: String,
    /// Redis connection URL of the task tracker. Absent means in-process tracking.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Redis hash holding the externally supplied run parameters.
    #[serde(default = "default_run_parameters_key")]
    pub run_parameters_key: String,
    /// Periodic run registered by the `schedule` command.
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
}

/// Days accepted in `schedule.weekdays`.
pub const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// When the scheduler service launches the pipeline.
///
/// Unset fields match any value, so `hour: 3, minute: 0` runs daily at 03:00.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub minute: Option<u32>,
    #[serde(default)]
    pub hour: Option<u32>,
    /// Day of the month.
    #[serde(default)]
    pub day: Option<u32>,
    #[serde(default)]
    pub month: Option<u32>,
    /// Lowercase English day names.
    #[serde(default)]
    pub weekdays: Vec<String>,
    /// Launch once right after registration as well.
    #[serde(default)]
    pub execute_immediately: bool,
    /// Queue the scheduler service itself listens on.
    #[serde(default = "default_scheduler_queue")]
    pub scheduler_queue: String,
    /// How often the scheduler service re-reads its registrations.
    #[serde(default = "default_sync_frequency_minutes")]
    pub sync_frequency_minutes: u32,
}

fn default_scheduler_queue() -> String {
    "services".to_string()
}

fn default_sync_frequency_minutes() -> u32 {
    30
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            minute: None,
            hour: None,
            day: None,
            month: None,
            weekdays: Vec::new(),
            execute_immediately: false,
            scheduler_queue: default_scheduler_queue(),
            sync_frequency_minutes: default_sync_frequency_minutes(),
        }
    }
}

impl ScheduleConfig {
    /// Daily run at `hour:minute`.
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self {
            hour: Some(hour),
            minute: Some(minute),
            ..Self::default()
        }
    }

    /// Builder method to restrict the run to the given days.
    pub fn on_weekdays<I, S>(mut self, days: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.weekdays = days.into_iter().map(Into::into).collect();
        self
    }

    /// Validates field ranges. At least one timing field must be set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minute.is_none()
            && self.hour.is_none()
            && self.day.is_none()
            && self.month.is_none()
            && self.weekdays.is_empty()
        {
            return Err(ConfigError::ValidationFailed(
                "schedule needs at least one of minute, hour, day, month, weekdays".to_string(),
            ));
        }

        check_range("schedule.minute", self.minute, 0, 59)?;
        check_range("schedule.hour", self.hour, 0, 23)?;
        check_range("schedule.day", self.day, 1, 31)?;
        check_range("schedule.month", self.month, 1, 12)?;

        if let Some(day) = self.weekdays.iter().find(|d| !WEEKDAYS.contains(&d.as_str())) {
            return Err(ConfigError::InvalidValue {
                key: "schedule.weekdays".to_string(),
                message: format!("unknown day '{}'", day),
            });
        }

        if self.scheduler_queue.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "schedule.scheduler_queue cannot be empty".to_string(),
            ));
        }

        if self.sync_frequency_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "schedule.sync_frequency_minutes".to_string(),
                message: "must be positive".to_string(),
            });
        }

        Ok(())
    }
}

fn check_range(key: &str, value: Option<u32>, min: u32, max: u32) -> Result<(), ConfigError> {
    match value {
        Some(v) if v < min || v > max => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{} is outside {}..={}", v, min, max),
        }),
        _ => Ok(()),
    }
}

fn default_queue() -> String {
    "default".to_string()
}

fn default_run_parameters_key() -> String {
    "run_parameters".to_string()
}

impl RemoteConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            pipeline_name: None,
            queue: default_queue(),
            redis_url: None,
            run_parameters_key: default_run_parameters_key(),
            schedule: None,
        }
    }

    /// Builder method to set the execution queue.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Builder method to set the pipeline name.
    pub fn with_pipeline_name(mut self, name: impl Into<String>) -> Self {
        self.pipeline_name = Some(name.into());
        self
    }

    /// Builder method to set the Redis URL.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    /// Builder method to set the periodic schedule.
    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Name the pipeline is registered under, falling back to `default`.
    pub fn pipeline_name_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.pipeline_name.as_deref().unwrap_or(default)
    }

    /// Validates the remote settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "remote project cannot be empty".to_string(),
            ));
        }

        if self.queue.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "remote queue cannot be empty".to_string(),
            ));
        }

        if self.run_parameters_key.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "run_parameters_key cannot be empty".to_string(),
            ));
        }

        if let Some(schedule) = &self.schedule {
            schedule.validate()?;
        }

        Ok(())
    }
}

/// Loads configuration files from disk.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pipeline_path: PathBuf,
    remote_path: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            pipeline_path: PathBuf::from(DEFAULT_PIPELINE_CONFIG_PATH),
            remote_path: PathBuf::from(DEFAULT_REMOTE_CONFIG_PATH),
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader whose paths come from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PIPELINE_CONFIG_PATH`: pipeline configuration (default: config/pipeline.yaml)
    /// - `PIPELINE_REMOTE_CONFIG_PATH`: remote settings (default: config/remote.yaml)
    pub fn from_env() -> Self {
        let mut loader = Self::default();

        if let Ok(val) = std::env::var("PIPELINE_CONFIG_PATH") {
            loader.pipeline_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("PIPELINE_REMOTE_CONFIG_PATH") {
            loader.remote_path = PathBuf::from(val);
        }

        loader
    }

    /// Builder method to set the pipeline configuration path.
    pub fn with_pipeline_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pipeline_path = path.into();
        self
    }

    /// Builder method to set the remote settings path.
    pub fn with_remote_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.remote_path = path.into();
        self
    }

    /// Loads and validates the pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed or validated.
    pub fn load_pipeline(&self) -> Result<PipelineConfiguration, ConfigError> {
        let config: PipelineConfiguration = read_yaml(&self.pipeline_path)?;
        config.validate()?;
        debug!(path = ?self.pipeline_path, "Pipeline configuration loaded");
        Ok(config)
    }

    /// Loads and validates the remote backend settings.
    pub fn load_remote(&self) -> Result<RemoteConfig, ConfigError> {
        let config: RemoteConfig = read_yaml(&self.remote_path)?;
        config.validate()?;
        debug!(path = ?self.remote_path, "Remote configuration loaded");
        Ok(config)
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_yaml::from_str(&content)?)
}
