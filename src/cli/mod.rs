//! CLI module for SplitX
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config_initialization::ConfigOverrides;
use crate::utils::logging::LogFormat;

pub mod args;
pub mod commands;

/// SplitX video splitter
///
/// Splits a video into numbered clips of a fixed length, using stream copy
/// where keyframes allow and re-encoding where they do not.
#[derive(Parser, Debug)]
#[command(name = "splitter")]
#[command(about = "SplitX - split videos into fixed-length clips")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = "SPLITX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level or filter directive
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    /// Parent directory for job workspaces
    #[arg(long, global = true)]
    pub temp_root: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Global flags plus the per-command flags that feed configuration.
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            log_level: self.log_level.clone(),
            log_format: self.log_format,
            temp_root: self.temp_root.clone(),
            ..Default::default()
        };
        if let Commands::Split(args) = &self.command {
            overrides.keyframe_tolerance = args.tolerance;
            overrides.per_job_concurrency = args.concurrency;
        }
        overrides
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split a video file into clips
    Split(args::SplitArgs),
    /// Print media information for a file
    Probe(args::ProbeArgs),
    /// Print the segment plan for a duration without touching any file
    Plan(args::PlanArgs),
    /// Run an interactive console session
    Serve(args::ServeArgs),
    /// Locate ffmpeg and ffprobe and print their versions
    CheckTools,
}
