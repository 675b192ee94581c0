use crate::server::access::AllowedHost;
use std::env;
use thiserror::Error;

/// Errors raised while loading configuration at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required in production")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("ALLOWED_ORIGIN must be an absolute URL with a host, got: {0}")]
    InvalidAllowedOrigin(String),
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Origin allowed to use the proxy. Only its hostname is used for matching,
    /// and subdomains of that host are accepted too.
    pub allowed_origin: String,
    /// Public base URL of the proxy (scheme + host). When unset, rewritten
    /// playlist links are derived from the request's Host header.
    pub base_url: Option<String>,
    pub is_dev: bool,
    /// Port for the Prometheus scrape listener. Disabled when `None`.
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT and ALLOWED_ORIGIN are required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        // Port: required in prod, defaults to 3000 in dev
        let port_raw = if is_dev {
            env::var("PORT").unwrap_or_else(|_| "3000".to_string())
        } else {
            env::var("PORT").map_err(|_| ConfigError::Missing("PORT"))?
        };
        let port = port_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "PORT",
            value: port_raw.clone(),
        })?;

        // Allowed origin: required in prod, defaults to localhost in dev
        let allowed_origin = if is_dev {
            env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string())
        } else {
            env::var("ALLOWED_ORIGIN").map_err(|_| ConfigError::Missing("ALLOWED_ORIGIN"))?
        };

        let base_url = env::var("BASE_URL")
            .ok()
            .map(|s| s.trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let metrics_port = match env::var("METRICS_PORT") {
            Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                name: "METRICS_PORT",
                value: raw.clone(),
            })?),
            Err(_) => None,
        };

        let config = Config {
            port,
            allowed_origin,
            base_url,
            is_dev,
            metrics_port,
        };

        // Fail at startup rather than on the first request
        config.allowed_host()?;

        Ok(config)
    }

    /// Hostname derived from `allowed_origin`.
    pub fn allowed_host(&self) -> Result<AllowedHost, ConfigError> {
        AllowedHost::from_origin(&self.allowed_origin)
            .ok_or_else(|| ConfigError::InvalidAllowedOrigin(self.allowed_origin.clone()))
    }
}
