//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Club backend configuration.
    pub backend: BackendConfig,
    /// Enforcement view configuration.
    #[serde(default)]
    pub enforcement: EnforcementConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Club REST backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend API, e.g. `https://clubs.example.edu/api`.
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// User agent sent to the backend.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl BackendConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Enforcement view configuration.
///
/// The lock and suspension thresholds are policy constants and are not
/// configurable here.
#[derive(Debug, Clone, Deserialize)]
pub struct EnforcementConfig {
    /// How often a live enforcement stream re-fetches escalations.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl EnforcementConfig {
    /// Refresh interval as a [`Duration`], never shorter than one second.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_timeout_secs() -> u64 {
    15
}

const fn default_connect_timeout_secs() -> u64 {
    5
}

const fn default_refresh_interval_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `CLUBHUB_ENV`)
    /// 3. Environment variables with `CLUBHUB__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("CLUBHUB_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CLUBHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("CLUBHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_for_missing_sections() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                "[backend]\nbase_url = \"http://localhost:8000/api\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.log_format, LogFormat::Pretty);
        assert_eq!(config.backend.timeout(), Duration::from_secs(15));
        assert_eq!(config.enforcement.refresh_interval(), Duration::from_secs(60));
        assert!(config.backend.user_agent.is_none());
    }

    #[test]
    fn test_sections_override_defaults() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 8080
                log_format = "json"

                [backend]
                base_url = "https://clubs.example.edu/api"
                timeout_secs = 3

                [enforcement]
                refresh_interval_secs = 10
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.backend.timeout(), Duration::from_secs(3));
        assert_eq!(config.backend.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.enforcement.refresh_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_refresh_interval_has_floor() {
        let config = EnforcementConfig {
            refresh_interval_secs: 0,
        };
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
    }
}
