//! CLI definition and run dispatch.
//!
//! A single command selects the execution backend with flags:
//!
//! - `--local`: stages run in-process
//! - `--remote`: stages run as tracked tasks on the Redis tracker
//! - both: remote definition executed in-process with an in-memory tracker
//!
//! Neither flag is a configuration error raised before any stage runs.
//!
//! The `schedule` subcommand registers the periodic run described in the
//! remote settings instead of running the pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use crate::config::{ConfigError, ConfigLoader, PipelineConfiguration, RemoteConfig};
use crate::data::{FileManager, LocalFileManager};
use crate::error::PipelineError;
use crate::metrics::{export_metrics, init_metrics};
use crate::pipeline::steps::{JsonDumpSource, TokenOverlapProvider};
use crate::pipeline::{
    LocalStepAdapter, PipelineController, PipelineSteps, RemotePipelineController,
    RemoteStepAdapter, RunnablePipeline,
};
use crate::publish::{ArtifactLogger, LocalLogger, TrackerLogger};
use crate::remote::{
    register_schedule, FileRunParameters, InMemoryScheduleRegistry, InMemoryTaskTracker,
    RedisRunParameters, RedisScheduleRegistry, RedisTaskTracker, RunParameterSource,
    ScheduleRegistry, StaticRunParameters, TaskTracker,
};

/// Default directory of the per-position resume dumps.
const DEFAULT_SOURCE_DIR: &str = "./data/source";

/// Default root of the persisted datasets.
const DEFAULT_DATASETS_DIR: &str = "./data/datasets";

/// Resume dataset pipeline: extraction, preprocessing, quality gate, reporting.
#[derive(Parser, Debug)]
#[command(name = "resume-pipeline")]
#[command(about = "Run the resume dataset pipeline locally or as tracked remote tasks")]
#[command(version)]
#[command(
    long_about = "resume-pipeline extracts resumes, preprocesses them, validates the result against a verified reference dataset and publishes reports.\n\nExample usage:\n  resume-pipeline --local --config config/pipeline.yaml\n  resume-pipeline --remote --remote-config config/remote.yaml\n  resume-pipeline --remote-config config/remote.yaml schedule"
)]
pub struct Cli {
    /// Optional subcommand. Without one the pipeline runs once.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Run every stage in the current process.
    #[arg(long)]
    pub local: bool,

    /// Run every stage as a tracked remote task.
    #[arg(long)]
    pub remote: bool,

    /// Pipeline configuration file.
    #[arg(short, long, env = "PIPELINE_CONFIG_PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Remote backend settings file.
    #[arg(long, env = "PIPELINE_REMOTE_CONFIG_PATH", global = true)]
    pub remote_config: Option<PathBuf>,

    /// JSON file of run parameters, used instead of the Redis parameter hash.
    #[arg(long)]
    pub parameters: Option<PathBuf>,

    /// Directory of the per-position resume dumps.
    #[arg(long, default_value = DEFAULT_SOURCE_DIR)]
    pub source_dir: PathBuf,

    /// Root directory of the persisted datasets.
    #[arg(long, default_value = DEFAULT_DATASETS_DIR)]
    pub datasets_dir: PathBuf,

    /// Project directory saved datasets are mirrored to when enabled.
    #[arg(long)]
    pub project_dir: Option<PathBuf>,

    /// Directory local reports are written to.
    #[arg(long)]
    pub reports_dir: Option<PathBuf>,

    /// Write Prometheus metrics of the run to this file.
    #[arg(long)]
    pub metrics_output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Register the periodic run from the `schedule` section of the remote settings.
    Schedule(ScheduleArgs),
}

/// Arguments for `resume-pipeline schedule`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ScheduleArgs {
    /// Print the record without writing it to Redis.
    #[arg(long)]
    pub dry_run: bool,
}

/// Execution backend selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Local,
    Remote,
    /// Remote definition executed in-process with an in-memory tracker.
    RemoteDebug,
}

impl Cli {
    /// Resolves the run mode from the backend flags.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMode` when no backend flag is set.
    pub fn mode(&self) -> Result<RunMode, ConfigError> {
        match (self.local, self.remote) {
            (true, false) => Ok(RunMode::Local),
            (false, true) => Ok(RunMode::Remote),
            (true, true) => Ok(RunMode::RemoteDebug),
            (false, false) => Err(ConfigError::InvalidMode(
                "select --local, --remote or both".to_string(),
            )),
        }
    }

    fn loader(&self) -> ConfigLoader {
        let mut loader = ConfigLoader::from_env();
        if let Some(path) = &self.config {
            loader = loader.with_pipeline_path(path);
        }
        if let Some(path) = &self.remote_config {
            loader = loader.with_remote_path(path);
        }
        loader
    }

    fn file_manager(&self) -> Arc<dyn FileManager> {
        let mut file_manager = LocalFileManager::new(&self.datasets_dir);
        if let Some(project_dir) = &self.project_dir {
            file_manager = file_manager.with_project_dir(project_dir);
        }
        Arc::new(file_manager)
    }

    fn steps(&self) -> PipelineSteps {
        PipelineSteps::standard(
            Arc::new(JsonDumpSource::new(&self.source_dir)),
            Arc::new(TokenOverlapProvider),
        )
    }
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the pipeline.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    if let Some(Command::Schedule(args)) = &cli.command {
        return run_schedule_command(&cli, args).await;
    }

    let mode = cli.mode()?;
    if let Err(e) = init_metrics() {
        warn!(error = %e, "Failed to initialize metrics");
    }

    let loader = cli.loader();
    let config = loader.load_pipeline()?;
    info!(pipeline = %config.common_properties.name, mode = ?mode, "Configuration loaded");

    let pipeline: Box<dyn RunnablePipeline> = match mode {
        RunMode::Local => build_local(&cli, config),
        RunMode::Remote | RunMode::RemoteDebug => {
            let remote = loader.load_remote()?;
            build_remote(&cli, mode, config, &remote).await?
        }
    };

    let outcome = pipeline.run().await;

    if let Some(path) = &cli.metrics_output {
        tokio::fs::write(path, export_metrics()).await?;
    }

    match outcome {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(PipelineError::ValidationFailed { error, message }) => {
            eprintln!("Data validation failed: {} ({})", error, error.description());
            eprintln!("{}", message);
            Err(PipelineError::ValidationFailed { error, message }.into())
        }
        Err(e) => {
            if let Some(stage) = e.stage() {
                eprintln!("Stage {} failed", stage);
            }
            Err(e.into())
        }
    }
}

async fn run_schedule_command(cli: &Cli, args: &ScheduleArgs) -> anyhow::Result<()> {
    let loader = cli.loader();
    let config = loader.load_pipeline()?;
    let remote = loader.load_remote()?;

    let registry: Box<dyn ScheduleRegistry> = match (args.dry_run, &remote.redis_url) {
        (true, _) => Box::new(InMemoryScheduleRegistry::new()),
        (false, Some(url)) => Box::new(RedisScheduleRegistry::connect(url).await?),
        (false, None) => {
            return Err(ConfigError::MissingParameter("redis_url".to_string()).into())
        }
    };

    let record =
        register_schedule(registry.as_ref(), &config.common_properties.name, &remote).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn build_local(cli: &Cli, config: PipelineConfiguration) -> Box<dyn RunnablePipeline> {
    let mut logger = LocalLogger::new();
    if let Some(dir) = &cli.reports_dir {
        logger = logger.with_reports_dir(dir);
    }

    let controller = PipelineController::new(
        config,
        LocalStepAdapter::new(),
        cli.steps(),
        cli.file_manager(),
        Arc::new(logger),
    );
    Box::new(controller.assemble())
}

async fn build_remote(
    cli: &Cli,
    mode: RunMode,
    config: PipelineConfiguration,
    remote: &RemoteConfig,
) -> anyhow::Result<Box<dyn RunnablePipeline>> {
    remote.validate()?;

    let tracker: Arc<dyn TaskTracker> = match (mode, &remote.redis_url) {
        (RunMode::Remote, Some(url)) => {
            Arc::new(RedisTaskTracker::connect(url, &remote.project, &remote.queue).await?)
        }
        (RunMode::Remote, None) => {
            return Err(ConfigError::MissingParameter("redis_url".to_string()).into())
        }
        _ => Arc::new(InMemoryTaskTracker::new()),
    };

    let parameters: Arc<dyn RunParameterSource> = match (&cli.parameters, mode, &remote.redis_url) {
        (Some(path), _, _) => Arc::new(FileRunParameters::new(path)),
        (None, RunMode::Remote, Some(url)) => {
            Arc::new(RedisRunParameters::connect(url, &remote.run_parameters_key).await?)
        }
        _ => Arc::new(StaticRunParameters::empty()),
    };

    let scope = remote
        .pipeline_name_or(&config.common_properties.name)
        .to_string();
    let logger: Arc<dyn ArtifactLogger> = Arc::new(TrackerLogger::new(tracker.clone(), scope));

    let controller = PipelineController::new(
        config,
        RemoteStepAdapter::new(tracker, &remote.project, &remote.queue),
        cli.steps(),
        cli.file_manager(),
        logger,
    );
    Ok(Box::new(
        RemotePipelineController::new(controller, parameters).assemble(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("resume-pipeline").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_mode_from_flags() {
        assert_eq!(parse(&["--local"]).mode().unwrap(), RunMode::Local);
        assert_eq!(parse(&["--remote"]).mode().unwrap(), RunMode::Remote);
        assert_eq!(parse(&["--local", "--remote"]).mode().unwrap(), RunMode::RemoteDebug);
    }

    #[test]
    fn test_no_backend_flag_is_config_error() {
        let err = parse(&[]).mode().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMode(_)));
    }

    #[tokio::test]
    async fn test_run_without_mode_fails_before_loading() {
        let cli = parse(&["--config", "/nonexistent/pipeline.yaml"]);
        let err = run_with_cli(cli).await.unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some_and(|e| matches!(e, ConfigError::InvalidMode(_))));
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["--local"]);
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.datasets_dir, PathBuf::from(DEFAULT_DATASETS_DIR));
        assert!(cli.parameters.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_schedule_command() {
        let cli = parse(&["schedule", "--dry-run", "--remote-config", "remote.yaml"]);
        assert_eq!(
            cli.command,
            Some(Command::Schedule(ScheduleArgs { dry_run: true }))
        );
        assert_eq!(cli.remote_config, Some(PathBuf::from("remote.yaml")));
    }

    const PIPELINE_YAML: &str = r#"
common_properties:
  name: resumes
components:
  extraction_step_properties:
    positions_to_extract: ["devops"]
  preprocessing_step_properties:
    unmatching_jobs_threshold: 0.5
  data_validating_step_properties: {}
  data_plot_creation_step_properties: {}
dataset:
  source_data: {name: source, description: raw, tag: raw}
  preprocessed_data: {name: preprocessed, description: clean, tag: interim}
  verified_data: {name: verified, description: trusted, tag: verified}
"#;

    fn schedule_cli(dir: &std::path::Path, remote_yaml: &str, extra: &[&str]) -> Cli {
        let pipeline = dir.join("pipeline.yaml");
        let remote = dir.join("remote.yaml");
        std::fs::write(&pipeline, PIPELINE_YAML).unwrap();
        std::fs::write(&remote, remote_yaml).unwrap();

        let mut args = vec![
            "--config".to_string(),
            pipeline.display().to_string(),
            "--remote-config".to_string(),
            remote.display().to_string(),
            "schedule".to_string(),
        ];
        args.extend(extra.iter().map(|a| a.to_string()));
        Cli::try_parse_from(std::iter::once("resume-pipeline".to_string()).chain(args)).unwrap()
    }

    #[tokio::test]
    async fn test_schedule_dry_run_needs_no_backend_flag() {
        let dir = tempfile::tempdir().unwrap();
        let cli = schedule_cli(
            dir.path(),
            "project: resumes\nschedule:\n  hour: 3\n  minute: 0\n",
            &["--dry-run"],
        );

        run_with_cli(cli).await.unwrap();
    }

    #[tokio::test]
    async fn test_schedule_without_redis_url_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = schedule_cli(
            dir.path(),
            "project: resumes\nschedule:\n  hour: 3\n",
            &[],
        );

        let err = run_with_cli(cli).await.unwrap_err();
        assert!(err
            .downcast_ref::<ConfigError>()
            .is_some_and(|e| matches!(e, ConfigError::MissingParameter(key) if key == "redis_url")));
    }

    #[tokio::test]
    async fn test_schedule_without_section_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = schedule_cli(dir.path(), "project: resumes\n", &["--dry-run"]);

        let err = run_with_cli(cli).await.unwrap_err();
        let err = err.downcast_ref::<PipelineError>().unwrap();
        assert!(matches!(
            err,
            PipelineError::Config(ConfigError::MissingParameter(key)) if key == "schedule"
        ));
    }
}
