// Configuration management with layered configuration (file, env)
// Environment variables are read only here, at the process boundary;
// everything below the binary receives explicit values.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rhsm: RhsmConfig,
    pub worker: WorkerConfig,
    pub push: PushConfig,
    pub observability: ObservabilityConfig,
}

/// RHSM backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RhsmConfig {
    /// Base URL of the RHSM API. Validated at client construction, not
    /// here: the client raises a configuration error when it is empty.
    pub url: String,
    /// Client certificate path (PEM)
    pub cert_path: Option<String>,
    /// Client key path (PEM)
    pub key_path: Option<String>,
    /// Verify the server TLS certificate
    pub verify_tls: bool,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum sleep between transport retries, in milliseconds
    pub max_retry_sleep_ms: u64,
}

impl Default for RhsmConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            cert_path: None,
            key_path: None,
            verify_tls: true,
            timeout_seconds: 30,
            max_retry_sleep_ms: 120_000,
        }
    }
}

impl RhsmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn max_retry_sleep(&self) -> Duration {
        Duration::from_millis(self.max_retry_sleep_ms)
    }
}

/// Request worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of parallel request workers
    pub request_threads: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { request_threads: 4 }
    }
}

/// AMI push task settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Comma-separated step names excluded from the run
    pub skip: Option<String>,
    /// Path of the image artifact handed to the cloud publisher
    pub image_path: String,
    /// Target region, e.g. "us-east-1"
    pub region: String,
    /// Provider short name registered with RHSM, e.g. "AWS"
    pub provider_short_name: String,
    pub image_id: String,
    pub image_name: String,
    pub arch: String,
    pub product: String,
    pub version: Option<String>,
    pub variant: Option<String>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            skip: None,
            image_path: String::new(),
            region: String::new(),
            provider_short_name: "AWS".to_string(),
            image_id: String::new(),
            image_name: String::new(),
            arch: "x86_64".to_string(),
            product: String::new(),
            version: None,
            variant: None,
        }
    }
}

impl PushConfig {
    /// Step names to skip, evaluated once before the run starts
    pub fn skip_names(&self) -> Vec<String> {
        self.skip
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("AMI")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.worker.request_threads == 0 {
            return Err("Worker request_threads must be greater than 0".to_string());
        }

        if self.rhsm.timeout_seconds == 0 {
            return Err("RHSM timeout_seconds must be greater than 0".to_string());
        }

        if self.rhsm.cert_path.is_some() != self.rhsm.key_path.is_some() {
            return Err("RHSM cert_path and key_path must be provided together".to_string());
        }

        Ok(())
    }
}
