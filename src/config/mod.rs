// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Prefix for environment overrides, e.g. `LB_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "LB";

/// Load configuration from a file (YAML or JSON) with `LB_` environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let settings = ::config::Config::builder()
        .add_source(::config::File::from(path))
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: Config = settings
        .try_deserialize()
        .context("Failed to parse config")?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "tcp-lb-{}-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4(),
            name
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_yaml_with_defaults() {
        let path = write_temp(
            "config.yaml",
            r#"
backends:
  - address: 127.0.0.1
    port: 3001
  - address: 127.0.0.1
    port: 3002
    weight: 5
"#,
        );

        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.listen_address(), "localhost:8080");
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].weight, 1);
        assert_eq!(config.backends[1].weight, 5);
        assert_eq!(config.health_check.interval_secs, 10);
        assert_eq!(config.health_check.timeout_secs, 2);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.path, "/metrics");
        assert_eq!(config.app.environment, "development");
        assert!(!config.app.is_production());
    }

    #[test]
    fn test_load_json() {
        let path = write_temp(
            "config.json",
            r#"{
                "server": { "host": "0.0.0.0", "port": 7000 },
                "backends": [ { "id": "primary", "address": "10.0.0.1", "port": 80 } ],
                "app": { "environment": "production", "log_level": "debug" }
            }"#,
        );

        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.backends[0].id.as_deref(), Some("primary"));
        assert!(config.app.is_production());
        assert_eq!(config.app.log_level, "debug");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_config("/definitely/not/here/config.yaml");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let path = write_temp(
            "bad.yaml",
            r#"
backends:
  - address: 127.0.0.1
    port: 3001
    weight: 0
"#,
        );

        let result = load_config(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    fn valid_config() -> Config {
        Config {
            server: ServerConfig::default(),
            backends: vec![BackendConfig {
                id: None,
                address: "127.0.0.1".to_string(),
                port: 3001,
                weight: 1,
            }],
            health_check: HealthCheckConfig::default(),
            metrics: MetricsConfig::default(),
            app: AppConfig::default(),
        }
    }

    #[test]
    fn test_validate_rules() {
        assert!(valid_config().validate().is_ok());

        let mut config = valid_config();
        config.backends.clear();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.backends[0].port = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.health_check.timeout_secs = config.health_check.interval_secs;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.metrics.path = "metrics".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.backends[0].id = Some("same".to_string());
        config.backends.push(BackendConfig {
            id: Some("same".to_string()),
            address: "127.0.0.1".to_string(),
            port: 3002,
            weight: 1,
        });
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.app.stats_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_explicit_id_clashing_with_generated_one() {
        let mut config = valid_config();
        config.backends[0].id = Some("backend-1".to_string());
        config.backends.push(BackendConfig {
            id: None,
            address: "127.0.0.1".to_string(),
            port: 3002,
            weight: 1,
        });

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backend-1"));
    }

    #[test]
    fn test_zero_stats_interval_in_file_is_rejected() {
        let path = write_temp(
            "stats.yaml",
            "backends:\n  - address: 127.0.0.1\n    port: 3001\napp:\n  stats_interval_secs: 0\n",
        );
        let result = load_config(&path);
        let _ = std::fs::remove_file(&path);
        assert!(result.is_err());
    }
}
