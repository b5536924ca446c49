//! Configuration initialization and hierarchy management
//!
//! Precedence, lowest to highest: defaults, config file, `SPLITX_*`
//! environment variables, command-line flags.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::adapters::toml_config::{AppConfig, TransportProfile};
use crate::error::{SplitError, SplitResult};
use crate::utils::logging::LogFormat;

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub temp_root: Option<PathBuf>,
    pub keyframe_tolerance: Option<f64>,
    pub per_job_concurrency: Option<usize>,
}

/// Build the effective configuration.
pub fn initialize_configuration(
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> SplitResult<AppConfig> {
    let mut config = AppConfig::load_or_default(config_path)?;
    let env_count = apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    let cli_count = apply_cli_overrides(&mut config, overrides);
    config.validate()?;

    if env_count + cli_count > 0 {
        info!(
            "Applied {} environment and {} command-line overrides",
            env_count, cli_count
        );
    }
    Ok(config)
}

/// Overlay `SPLITX_*` variables read through `lookup`.
pub fn apply_env_overrides(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> SplitResult<usize> {
    let mut applied = 0;

    if let Some(v) = lookup("SPLITX_LOG_LEVEL") {
        config.logging.level = v;
        applied += 1;
    }
    if let Some(v) = lookup("SPLITX_LOG_FORMAT") {
        config.logging.format = v.parse().map_err(SplitError::Config)?;
        applied += 1;
    }
    if let Some(v) = lookup("SPLITX_TEMP_ROOT") {
        config.temp_root = PathBuf::from(v);
        applied += 1;
    }
    if let Some(v) = lookup("SPLITX_TRANSPORT") {
        config.transport = v.parse::<TransportProfile>().map_err(SplitError::Config)?;
        applied += 1;
    }
    if let Some(v) = lookup("SPLITX_FFMPEG") {
        config.tools.ffmpeg = Some(PathBuf::from(v));
        applied += 1;
    }
    if let Some(v) = lookup("SPLITX_FFPROBE") {
        config.tools.ffprobe = Some(PathBuf::from(v));
        applied += 1;
    }
    if let Some(v) = lookup("SPLITX_MAX_SEGMENT_SECONDS") {
        config.limits.max_segment_seconds = parse_env("SPLITX_MAX_SEGMENT_SECONDS", &v)?;
        applied += 1;
    }
    if let Some(v) = lookup("SPLITX_MAX_UPLOAD_BYTES") {
        config.limits.max_upload_bytes = Some(parse_env("SPLITX_MAX_UPLOAD_BYTES", &v)?);
        applied += 1;
    }
    if let Some(v) = lookup("SPLITX_PER_JOB_CONCURRENCY") {
        config.limits.per_job_concurrency = parse_env("SPLITX_PER_JOB_CONCURRENCY", &v)?;
        applied += 1;
    }
    if let Some(v) = lookup("SPLITX_GLOBAL_CONCURRENCY") {
        config.limits.global_concurrency = parse_env("SPLITX_GLOBAL_CONCURRENCY", &v)?;
        applied += 1;
    }
    if let Some(v) = lookup("SPLITX_KEYFRAME_TOLERANCE") {
        config.cutter.keyframe_tolerance_secs = parse_env("SPLITX_KEYFRAME_TOLERANCE", &v)?;
        applied += 1;
    }
    if let Some(v) = lookup("SPLITX_SESSION_IDLE_SECS") {
        config.timeouts.session_idle_secs = parse_env("SPLITX_SESSION_IDLE_SECS", &v)?;
        applied += 1;
    }

    Ok(applied)
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> SplitResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SplitError::Config(format!("{} has invalid value '{}'", key, value)))
}

/// Overlay command-line flags.
pub fn apply_cli_overrides(config: &mut AppConfig, overrides: &ConfigOverrides) -> usize {
    let mut applied = 0;

    if let Some(level) = &overrides.log_level {
        config.logging.level = level.clone();
        applied += 1;
    }
    if let Some(format) = overrides.log_format {
        config.logging.format = format;
        applied += 1;
    }
    if let Some(root) = &overrides.temp_root {
        config.temp_root = root.clone();
        applied += 1;
    }
    if let Some(tolerance) = overrides.keyframe_tolerance {
        config.cutter.keyframe_tolerance_secs = tolerance;
        applied += 1;
    }
    if let Some(n) = overrides.per_job_concurrency {
        config.limits.per_job_concurrency = n;
        applied += 1;
    }

    applied
}
