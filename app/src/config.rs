use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

pub const ENV_PREFIX: &str = "BYTE_INVOICE_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Env(#[from] envy::Error),
    #[error("invalid bind address {addr:?}: {source}")]
    BindAddr {
        addr: String,
        source: std::net::AddrParseError,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Settings read from `BYTE_INVOICE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("byte-invoice.db")
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_log_filter() -> String {
    "byte_invoice_lib=info,tower_http=info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            api_base_url: default_api_base_url(),
            log_format: LogFormat::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Loads `.env` when present, then the prefixed environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(ENV_PREFIX).from_iter(vars)?)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .trim()
            .parse()
            .map_err(|source| ConfigError::BindAddr {
                addr: self.bind_addr.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = AppConfig::from_vars(vars(&[("PATH", "/usr/bin")])).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.socket_addr().unwrap().port(), 3000);
    }

    #[test]
    fn prefixed_variables_override_defaults() {
        let cfg = AppConfig::from_vars(vars(&[
            ("BYTE_INVOICE_BIND_ADDR", "0.0.0.0:8080"),
            ("BYTE_INVOICE_DB_PATH", "/tmp/books.db"),
            ("BYTE_INVOICE_LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/books.db"));
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.api_base_url, "http://127.0.0.1:3000");
    }

    #[test]
    fn bad_values_are_reported() {
        assert!(AppConfig::from_vars(vars(&[("BYTE_INVOICE_LOG_FORMAT", "xml")])).is_err());
        let cfg = AppConfig {
            bind_addr: "localhost".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(cfg.socket_addr(), Err(ConfigError::BindAddr { .. })));
    }
}
