//! Configuration management for the Fortune API.
//!
//! Settings are layered: built-in defaults, then an optional YAML file,
//! then environment variables.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, File, FileFormat};
use duration_str::deserialize_duration;
use serde::Deserialize;
use tracing::warn;

use crate::error::{FortuneError, Result};
use crate::ratelimit::{Quota, DEFAULT_IDLE_THRESHOLD, DEFAULT_SWEEP_INTERVAL};

/// Environment variables, the configuration keys they override and the
/// kind of value each one must hold.
const ENV_OVERRIDES: &[(&str, &str, EnvKind)] = &[
    ("SERVER_ADDRESS", "server.address", EnvKind::Text),
    ("WRITE_TIMEOUT", "server.request_timeout", EnvKind::Duration),
    ("SHUTDOWN_TIMEOUT", "server.shutdown_timeout", EnvKind::Duration),
    ("FORTUNE_PATH", "fortune.path", EnvKind::Text),
    ("RATE_LIMIT_RPS", "rate_limiting.requests_per_second", EnvKind::Float),
    ("RATE_LIMIT_BURST", "rate_limiting.burst", EnvKind::Integer),
    ("RATE_LIMIT_SWEEP_INTERVAL", "rate_limiting.sweep_interval", EnvKind::Duration),
    ("RATE_LIMIT_IDLE_TIMEOUT", "rate_limiting.idle_timeout", EnvKind::Duration),
];

#[derive(Debug, Clone, Copy)]
enum EnvKind {
    Text,
    Duration,
    Float,
    Integer,
}

impl EnvKind {
    fn accepts(self, value: &str) -> bool {
        match self {
            EnvKind::Text => true,
            EnvKind::Duration => duration_str::parse(value).is_ok(),
            EnvKind::Float => value.parse::<f64>().is_ok(),
            EnvKind::Integer => value.parse::<u32>().is_ok(),
        }
    }
}

/// Main configuration for the Fortune API service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Fortune command configuration
    #[serde(default)]
    pub fortune: FortuneConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address; a bare `:port` listens on all interfaces
    #[serde(default = "default_address")]
    pub address: String,

    /// Upper bound on handling a single request
    #[serde(default = "default_request_timeout", deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,

    /// Grace period for in-flight requests after a shutdown signal
    #[serde(default = "default_shutdown_timeout", deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            request_timeout: default_request_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    /// The address to bind, with a bare `:port` expanded to all interfaces.
    pub fn bind_address(&self) -> String {
        match self.address.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.address.clone(),
        }
    }
}

fn default_address() -> String {
    ":8080".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Fortune command configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FortuneConfig {
    /// Path to the fortune executable
    #[serde(default = "default_fortune_path")]
    pub path: String,
}

impl Default for FortuneConfig {
    fn default() -> Self {
        Self {
            path: default_fortune_path(),
        }
    }
}

fn default_fortune_path() -> String {
    "fortune".to_string()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitingConfig {
    /// Tokens refilled per second for each client
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Maximum burst size for each client
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Time between idle client sweeps
    #[serde(default = "default_sweep_interval", deserialize_with = "deserialize_duration")]
    pub sweep_interval: Duration,

    /// Idle time after which a client's state is dropped
    #[serde(default = "default_idle_timeout", deserialize_with = "deserialize_duration")]
    pub idle_timeout: Duration,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
            sweep_interval: default_sweep_interval(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

impl RateLimitingConfig {
    /// The per-client quota described by this configuration.
    pub fn quota(&self) -> Quota {
        Quota::new(self.requests_per_second, self.burst)
    }
}

fn default_requests_per_second() -> f64 {
    Quota::default().rate
}

fn default_burst() -> u32 {
    Quota::default().burst
}

fn default_sweep_interval() -> Duration {
    DEFAULT_SWEEP_INTERVAL
}

fn default_idle_timeout() -> Duration {
    DEFAULT_IDLE_THRESHOLD
}

impl ServiceConfig {
    /// Load configuration from an optional YAML file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, &std::env::vars().collect())
    }

    /// Load configuration from an optional YAML file and the given variables.
    pub fn load_with_env(path: Option<&Path>, env: &HashMap<String, String>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        for (var, key, kind) in ENV_OVERRIDES {
            let Some(value) = env.get(*var).filter(|v| !v.is_empty()) else {
                continue;
            };

            if !kind.accepts(value) {
                warn!(
                    variable = %var,
                    value = %value,
                    "Ignoring unparsable environment value"
                );
                continue;
            }

            builder = builder.set_override(*key, value.as_str())?;
        }

        let config: ServiceConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.rate_limiting;

        if !(limits.requests_per_second.is_finite() && limits.requests_per_second > 0.0) {
            return Err(FortuneError::Config(format!(
                "requests_per_second must be positive, got {}",
                limits.requests_per_second
            )));
        }

        if limits.burst == 0 {
            return Err(FortuneError::Config("burst must be at least 1".to_string()));
        }

        if limits.sweep_interval.is_zero() {
            return Err(FortuneError::Config("sweep_interval must be non-zero".to_string()));
        }

        if self.server.address.is_empty() {
            return Err(FortuneError::Config("server address must not be empty".to_string()));
        }

        Ok(())
    }
}
