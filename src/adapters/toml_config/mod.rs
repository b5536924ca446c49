// TOML config adapter - Application configuration loaded from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SplitError, SplitResult};
use crate::utils::logging::LoggingConfig;

/// File names searched when no explicit config path is given
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "./splitx.toml",
    "./config/splitx.toml",
    "/etc/splitx/config.toml",
];

/// Which inbound transport the deployment uses; decides the upload limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProfile {
    /// Size-limited request/response API
    #[default]
    Standard,
    /// Higher-capacity streaming client
    Streaming,
}

impl TransportProfile {
    pub fn default_upload_limit(self) -> u64 {
        match self {
            TransportProfile::Standard => 20 * 1024 * 1024,
            TransportProfile::Streaming => 2 * 1024 * 1024 * 1024,
        }
    }
}

impl std::str::FromStr for TransportProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(TransportProfile::Standard),
            "streaming" => Ok(TransportProfile::Streaming),
            other => Err(format!("unknown transport profile '{}'", other)),
        }
    }
}

/// Media tool locations; unset means look up on `PATH`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

impl ToolsConfig {
    pub fn resolve_ffmpeg(&self) -> SplitResult<PathBuf> {
        resolve_tool(self.ffmpeg.as_deref(), "ffmpeg")
    }

    pub fn resolve_ffprobe(&self) -> SplitResult<PathBuf> {
        resolve_tool(self.ffprobe.as_deref(), "ffprobe")
    }
}

fn resolve_tool(configured: Option<&Path>, name: &str) -> SplitResult<PathBuf> {
    match configured {
        Some(path) => which::which(path)
            .map_err(|e| SplitError::Config(format!("{} at {}: {e}", name, path.display()))),
        None => which::which(name)
            .map_err(|_| SplitError::Config(format!("{} not found on PATH", name))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest segment length a user may request
    pub max_segment_seconds: u32,
    /// Overrides the transport profile's upload limit
    pub max_upload_bytes: Option<u64>,
    /// Concurrent cuts within one job
    pub per_job_concurrency: usize,
    /// Concurrent cuts across all jobs
    pub global_concurrency: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_segment_seconds: 3600,
            max_upload_bytes: None,
            per_job_concurrency: 2,
            global_concurrency: num_cpus::get().max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub probe_secs: u64,
    pub cut_secs: u64,
    pub session_idle_secs: u64,
    pub sweep_interval_secs: u64,
    pub terminal_grace_millis: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            probe_secs: 60,
            cut_secs: 600,
            session_idle_secs: 1800,
            sweep_interval_secs: 60,
            terminal_grace_millis: 1500,
        }
    }
}

impl TimeoutsConfig {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn cut(&self) -> Duration {
        Duration::from_secs(self.cut_secs)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn terminal_grace(&self) -> Duration {
        Duration::from_millis(self.terminal_grace_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutterConfig {
    /// Largest backward snap to a keyframe before re-encoding
    pub keyframe_tolerance_secs: f64,
    pub crf: u8,
    pub preset: String,
    pub audio_codec: String,
    /// Probe each produced clip and reject truncated output
    pub verify_duration: bool,
    pub duration_slack_secs: f64,
}

impl Default for CutterConfig {
    fn default() -> Self {
        Self {
            keyframe_tolerance_secs: 1.0,
            crf: 18,
            preset: "medium".to_string(),
            audio_codec: "aac".to_string(),
            verify_duration: true,
            duration_slack_secs: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub attempts: u32,
    pub backoff_millis: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_millis: 500,
        }
    }
}

impl DeliveryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_millis)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Parent of all job workspaces
    pub temp_root: PathBuf,
    pub transport: TransportProfile,
    pub tools: ToolsConfig,
    pub limits: LimitsConfig,
    pub timeouts: TimeoutsConfig,
    pub cutter: CutterConfig,
    pub delivery: DeliveryConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir().join("splitx"),
            transport: TransportProfile::default(),
            tools: ToolsConfig::default(),
            limits: LimitsConfig::default(),
            timeouts: TimeoutsConfig::default(),
            cutter: CutterConfig::default(),
            delivery: DeliveryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document; absent keys take their defaults.
    pub fn from_toml_str(content: &str) -> SplitResult<Self> {
        toml::from_str(content).map_err(|e| SplitError::Config(format!("invalid TOML: {e}")))
    }

    pub fn load(path: &Path) -> SplitResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SplitError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `custom` if given, else the first default path that exists,
    /// else defaults.
    pub fn load_or_default(custom: Option<&Path>) -> SplitResult<Self> {
        if let Some(path) = custom {
            return Self::load(path);
        }
        for candidate in DEFAULT_CONFIG_PATHS {
            let path = Path::new(candidate);
            if path.is_file() {
                return Self::load(path);
            }
        }
        Ok(Self::default())
    }

    /// Effective upload size limit.
    pub fn max_upload_bytes(&self) -> u64 {
        self.limits
            .max_upload_bytes
            .unwrap_or_else(|| self.transport.default_upload_limit())
    }

    pub fn validate(&self) -> SplitResult<()> {
        if self.limits.per_job_concurrency == 0 || self.limits.global_concurrency == 0 {
            return Err(SplitError::Config("concurrency limits must be at least 1".into()));
        }
        if self.limits.max_segment_seconds == 0 {
            return Err(SplitError::Config("max_segment_seconds must be at least 1".into()));
        }
        let tolerance = self.cutter.keyframe_tolerance_secs;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(SplitError::Config(format!(
                "keyframe_tolerance_secs must be a non-negative number, got {}",
                tolerance
            )));
        }
        if self.cutter.crf > 51 {
            return Err(SplitError::Config(format!("crf must be 0-51, got {}", self.cutter.crf)));
        }
        if self.delivery.attempts == 0 {
            return Err(SplitError::Config("delivery attempts must be at least 1".into()));
        }
        if self.timeouts.probe_secs == 0 || self.timeouts.cut_secs == 0 {
            return Err(SplitError::Config("tool timeouts must be at least 1 second".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_upload_bytes(), 20 * 1024 * 1024);
        assert_eq!(config.limits.max_segment_seconds, 3600);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            transport = "streaming"

            [cutter]
            keyframe_tolerance_secs = 0.5

            [limits]
            per_job_concurrency = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.cutter.keyframe_tolerance_secs, 0.5);
        assert_eq!(config.cutter.crf, 18);
        assert_eq!(config.limits.per_job_concurrency, 4);
        assert_eq!(config.max_upload_bytes(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.limits.per_job_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.cutter.keyframe_tolerance_secs = -1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.delivery.attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let err = AppConfig::load_or_default(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, SplitError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("splitx.toml");
        let contents = "temp_root = \"/var/tmp/splitx\"\n[delivery]\nattempts = 5\n";
        std::fs::write(&path, contents).unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.temp_root, PathBuf::from("/var/tmp/splitx"));
        assert_eq!(config.delivery.attempts, 5);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            AppConfig::from_toml_str("limits = 3"),
            Err(SplitError::Config(_))
        ));
    }
}
