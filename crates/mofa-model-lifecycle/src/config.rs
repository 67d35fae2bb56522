//! Configuration for the model lifecycle controller

use crate::hardware::DEFAULT_ACCELERATED_MIN_MEMORY_MB;
use crate::retry::RetryPolicy;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides, e.g. `MOFA_LIFECYCLE_MAX_ATTEMPTS=5`
pub const ENV_PREFIX: &str = "MOFA_LIFECYCLE";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables of the lifecycle controller, resolver and metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Total load attempts per `request_ready` (1 = no retry)
    pub max_attempts: u32,

    /// Retry delay unit; attempt `n` waits `n * base_delay_ms`
    pub base_delay_ms: u64,

    /// How long path resolution waits for a permission decision
    pub permission_timeout_ms: u64,

    /// Artifacts smaller than this are rejected as corrupt
    pub min_artifact_bytes: u64,

    /// Total memory required before recommending the accelerated backend
    pub accelerated_min_memory_mb: u64,

    /// File extension appended to model names without one
    pub artifact_extension: String,

    /// Ring buffer capacity for inference records
    pub metrics_capacity: usize,

    /// Records per window in degradation detection
    pub degradation_window: usize,

    /// Relative slowdown (0.2 = 20%) that counts as degradation
    pub degradation_threshold: f64,

    /// Buffered state transitions per subscriber before the oldest are dropped
    pub state_channel_capacity: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            permission_timeout_ms: 30_000,
            min_artifact_bytes: 1024 * 1024,
            accelerated_min_memory_mb: DEFAULT_ACCELERATED_MIN_MEMORY_MB,
            artifact_extension: String::from("bin"),
            metrics_capacity: 100,
            degradation_window: 5,
            degradation_threshold: 0.2,
            state_channel_capacity: 64,
        }
    }
}

impl LifecycleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML, YAML or JSON file, then apply `MOFA_LIFECYCLE_*`
    /// environment overrides. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let format = detect_format(path)?;
        let path_str = path
            .to_str()
            .ok_or_else(|| ConfigError::UnsupportedFormat("non UTF-8 path".to_string()))?;

        let parsed: Self = Config::builder()
            .add_source(File::new(path_str, format))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject values the controller cannot operate with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be > 0"));
        }
        if self.metrics_capacity == 0 {
            return Err(ConfigError::Invalid("metrics_capacity must be > 0"));
        }
        if self.degradation_window == 0 {
            return Err(ConfigError::Invalid("degradation_window must be > 0"));
        }
        if self.degradation_window.saturating_mul(2) > self.metrics_capacity {
            return Err(ConfigError::Invalid(
                "metrics_capacity must hold two degradation windows",
            ));
        }
        if self.degradation_threshold.is_nan() || self.degradation_threshold < 0.0 {
            return Err(ConfigError::Invalid("degradation_threshold must be >= 0"));
        }
        if self.state_channel_capacity == 0 {
            return Err(ConfigError::Invalid("state_channel_capacity must be > 0"));
        }
        Ok(())
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Result<Self, &'static str> {
        if attempts == 0 {
            return Err("max_attempts must be > 0");
        }
        self.max_attempts = attempts;
        Ok(self)
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_permission_timeout(mut self, timeout: Duration) -> Self {
        self.permission_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_min_artifact_bytes(mut self, bytes: u64) -> Self {
        self.min_artifact_bytes = bytes;
        self
    }

    pub fn with_accelerated_min_memory_mb(mut self, mb: u64) -> Self {
        self.accelerated_min_memory_mb = mb;
        self
    }

    pub fn with_artifact_extension(mut self, ext: impl Into<String>) -> Self {
        self.artifact_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_metrics_capacity(mut self, capacity: usize) -> Result<Self, &'static str> {
        if capacity == 0 {
            return Err("metrics_capacity must be > 0");
        }
        if self.degradation_window.saturating_mul(2) > capacity {
            return Err("metrics_capacity must hold two degradation windows");
        }
        self.metrics_capacity = capacity;
        Ok(self)
    }

    /// Set the degradation window and threshold (0.2 = 20% slower)
    pub fn with_degradation(mut self, window: usize, threshold: f64) -> Result<Self, &'static str> {
        if window == 0 {
            return Err("degradation_window must be > 0");
        }
        if threshold.is_nan() || threshold < 0.0 {
            return Err("degradation_threshold must be >= 0");
        }
        if window.saturating_mul(2) > self.metrics_capacity {
            return Err("metrics_capacity must hold two degradation windows");
        }
        self.degradation_window = window;
        self.degradation_threshold = threshold;
        Ok(self)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }

    pub fn permission_timeout(&self) -> Duration {
        Duration::from_millis(self.permission_timeout_ms)
    }
}

/// Detect configuration format from file extension
pub fn detect_format(path: &Path) -> ConfigResult<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================
