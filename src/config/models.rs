// src/config/models.rs
use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub backends: Vec<BackendConfig>,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub id: Option<String>,
    pub address: String,
    pub port: u16,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl BackendConfig {
    /// Registry id for the backend at `index`; `backend-<index>` unless set.
    pub fn effective_id(&self, index: usize) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("backend-{}", index))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_health_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_weight() -> u32 {
    1
}

fn default_health_interval() -> u64 {
    10
}

fn default_health_timeout() -> u64 {
    2
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stats_interval() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_health_interval(),
            timeout_secs: default_health_timeout(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            stats_interval_secs: default_stats_interval(),
        }
    }
}

impl ServerConfig {
    /// `host:port` the listener binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }
        if self.backends.is_empty() {
            bail!("at least one backend must be configured");
        }

        let mut seen_ids = HashSet::new();
        for (index, backend) in self.backends.iter().enumerate() {
            if backend.address.trim().is_empty() {
                bail!("backend #{} has an empty address", index);
            }
            if backend.port == 0 {
                bail!("backend #{} ({}) has port 0", index, backend.address);
            }
            if backend.weight == 0 {
                bail!("backend #{} ({}) must have a weight of at least 1", index, backend.address);
            }
            let id = backend.effective_id(index);
            if !seen_ids.insert(id.clone()) {
                bail!("duplicate backend id '{}'", id);
            }
        }

        if self.health_check.interval_secs == 0 {
            bail!("health_check.interval_secs must be greater than zero");
        }
        if self.health_check.timeout_secs == 0 {
            bail!("health_check.timeout_secs must be greater than zero");
        }
        if self.health_check.timeout_secs >= self.health_check.interval_secs {
            bail!(
                "health_check.timeout_secs ({}) must be shorter than interval_secs ({})",
                self.health_check.timeout_secs,
                self.health_check.interval_secs
            );
        }

        if self.app.stats_interval_secs == 0 {
            bail!("app.stats_interval_secs must be greater than zero");
        }

        if !self.metrics.path.starts_with('/') {
            bail!("metrics.path must start with '/'");
        }

        Ok(())
    }
}
