//! Application configuration loaded from environment variables.

use std::time::Duration;

use coordinator::{HttpClientConfig, RetryPolicy};
use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; in-memory storage when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `EXTERNAL_API_URL`: sync endpoint; in-memory client when unset
/// - `EXTERNAL_API_TIMEOUT_MS`: external call timeout (default: `5000`)
/// - `UPDATE_RETRY_ATTEMPTS`: retries of transient step 1 failures (default: `0`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub external_api_url: Option<String>,
    pub external_api_timeout: Duration,
    pub retry_attempts: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// unset or empty variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let log_format = match get("LOG_FORMAT") {
            None => defaults.log_format,
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "LOG_FORMAT",
                        value: v,
                    });
                }
            },
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse(&get, "PORT")?.unwrap_or(defaults.port),
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse(&get, "DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.database_max_connections),
            external_api_url: get("EXTERNAL_API_URL"),
            external_api_timeout: parse(&get, "EXTERNAL_API_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.external_api_timeout),
            retry_attempts: parse(&get, "UPDATE_RETRY_ATTEMPTS")?
                .unwrap_or(defaults.retry_attempts),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Retry policy applied to updates.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_retries(self.retry_attempts)
    }

    /// HTTP client configuration, if an external endpoint is configured.
    pub fn http_client_config(&self) -> Option<HttpClientConfig> {
        self.external_api_url
            .as_ref()
            .map(|url| HttpClientConfig::new(url.clone()).with_timeout(self.external_api_timeout))
    }
}

fn parse<T, G>(get: &G, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    get(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { var, value })
        })
        .transpose()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 5,
            external_api_url: None,
            external_api_timeout: Duration::from_millis(5000),
            retry_attempts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.database_url, None);
        assert_eq!(config.external_api_timeout, Duration::from_secs(5));
        assert_eq!(config.retry_attempts, 0);
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        assert_eq!(load(&[]).unwrap(), Config::default());
    }

    #[test]
    fn test_reads_all_variables() {
        let config = load(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("RUST_LOG", "debug"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/users"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("EXTERNAL_API_URL", "http://crm.internal/sync"),
            ("EXTERNAL_API_TIMEOUT_MS", "250"),
            ("UPDATE_RETRY_ATTEMPTS", "3"),
        ])
        .unwrap();

        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/users"));
        assert_eq!(config.database_max_connections, 12);
        assert_eq!(config.retry_policy().max_attempts, 4);

        let http = config.http_client_config().unwrap();
        assert_eq!(http.endpoint, "http://crm.internal/sync");
        assert_eq!(http.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = load(&[("PORT", ""), ("DATABASE_URL", "  ")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert_eq!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid {
                var: "PORT",
                value: "eighty".to_string()
            })
        );
        assert!(load(&[("LOG_FORMAT", "xml")]).is_err());
        assert!(load(&[("EXTERNAL_API_TIMEOUT_MS", "-1")]).is_err());
    }

    #[test]
    fn test_no_http_client_without_url() {
        assert!(Config::default().http_client_config().is_none());
    }
}
