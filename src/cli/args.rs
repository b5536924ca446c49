//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;
use clap_num::number_range;

fn concurrency(s: &str) -> Result<usize, String> {
    number_range(s, 1, 64)
}

fn non_negative_seconds(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("`{s}` must be a non-negative number of seconds"));
    }
    Ok(value)
}

fn positive_seconds(s: &str) -> Result<f64, String> {
    let value = non_negative_seconds(s)?;
    if value == 0.0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(value)
}

/// Arguments for the split command
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Clip length: seconds, MM:SS or HH:MM:SS
    #[arg(short, long)]
    pub length: String,

    /// Directory receiving the clips
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Maximum keyframe drift accepted for stream copy, in seconds
    #[arg(long, value_parser = non_negative_seconds)]
    pub tolerance: Option<f64>,

    /// Clips cut in parallel (1-64)
    #[arg(long, value_parser = concurrency)]
    pub concurrency: Option<usize>,
}

/// Arguments for the probe command
#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the plan command
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Source duration in seconds
    #[arg(short, long, value_parser = positive_seconds)]
    pub duration: f64,

    /// Clip length: seconds, MM:SS or HH:MM:SS
    #[arg(short, long)]
    pub length: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// User id for lines without an `@id` prefix
    #[arg(short, long, default_value = "console")]
    pub user: String,
}
