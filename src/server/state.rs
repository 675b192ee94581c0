use crate::{config::Config, server::access::AccessGate, upstream::UpstreamClient};
use std::sync::Arc;

/// Application state shared across all handlers
///
/// Immutable after startup; cloning is cheap and requests never contend on it.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Origin/Referer gate built from the configured allowed origin
    pub access_gate: AccessGate,
    /// Shared HTTP client for connection pooling
    pub upstream: UpstreamClient,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let access_gate = AccessGate::new(config.allowed_host()?);
        let upstream = UpstreamClient::new()?;

        Ok(Self {
            config: Arc::new(config),
            access_gate,
            upstream,
        })
    }
}
