//! SplitX video splitter
//!
//! Splits a video into numbered fixed-length clips with ffmpeg.
//!
//! # Usage
//!
//! ```bash
//! splitter split --input talk.mp4 --length 30 --out-dir clips/
//! splitter probe --input talk.mp4
//! splitter plan --duration 100 --length 30
//! splitter serve --user alice
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use splitx_cli::cli::{commands, Cli, Commands};
use splitx_cli::config_initialization::initialize_configuration;
use splitx_cli::utils::logging::init_logging;
use splitx_cli::workspace::WorkspaceManager;

/// Main entry point for the SplitX CLI application
fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = initialize_configuration(cli.config.as_deref(), &cli.overrides())
        .context("Failed to load configuration")?;
    init_logging(&config.logging);

    info!("Starting SplitX");

    // Only the long-running session owns the whole temp root
    if matches!(cli.command, Commands::Serve(_)) {
        let purged = WorkspaceManager::new(config.temp_root.clone()).purge_stale();
        if purged > 0 {
            warn!("Removed {} workspaces left by a previous run", purged);
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(async {
        match cli.command {
            Commands::Split(args) => {
                info!("Executing split command");
                commands::split(&config, args).await
            }
            Commands::Probe(args) => {
                info!("Executing probe command");
                commands::probe(&config, args).await
            }
            Commands::Plan(args) => commands::plan(&config, args),
            Commands::Serve(args) => {
                info!("Executing serve command");
                commands::serve(&config, args).await
            }
            Commands::CheckTools => commands::check_tools(&config).await,
        }
    });

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
