pub mod access;
pub mod handlers;
pub mod relay;
pub mod state;
pub mod target;

use crate::{config::Config, metrics};
use axum::{
    Router,
    http::{HeaderName, HeaderValue},
    middleware,
};
use state::AppState;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info};

/// Header carrying the crate version on every response.
pub const VERSION_HEADER: &str = "x-hlsgate-version";

/// Build the router: every method and path is a proxy request, behind the
/// access gate.
pub fn build_router(config: Config) -> Result<Router, Box<dyn std::error::Error>> {
    let state = AppState::new(config)?;

    info!(
        "Access restricted to {} and its subdomains",
        state.access_gate.allowed_host().as_str()
    );

    let app = Router::new()
        .fallback(handlers::proxy::proxy_request)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            access::access_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(VERSION_HEADER),
            HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
        ))
        .with_state(state);

    Ok(app)
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    if let Some(port) = config.metrics_port {
        metrics::install_exporter(port)?;
    }

    let app = build_router(config)?;

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("🚀 Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
