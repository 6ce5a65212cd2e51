//! Command-line interface for resume-pipeline.
//!
//! Selects the execution backend, loads configuration and runs the
//! pipeline once, or registers its periodic schedule.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Command, RunMode, ScheduleArgs};
