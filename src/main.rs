//! resume-pipeline CLI entry point.
//!
//! Initializes logging, records what was requested and delegates to the
//! CLI module.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first to get log_level
    let cli = resume_pipeline::cli::parse_cli();

    // Priority: RUST_LOG env var > --log-level CLI arg > default "info"
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone());

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)))
        .init();

    match &cli.command {
        Some(command) => tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            command = ?command,
            remote_config = ?cli.remote_config,
            "Starting resume-pipeline"
        ),
        None => tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            mode = ?cli.mode().ok(),
            config = ?cli.config,
            "Starting resume-pipeline"
        ),
    }

    resume_pipeline::cli::run_with_cli(cli).await
}
