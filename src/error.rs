use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Errors that terminate a proxied request
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Access Denied: This proxy can only be used from a specific domain.")]
    AccessDenied,

    #[error("Error: Missing \"url\" parameter. Usage: /?url=YOUR_TARGET_URL")]
    MissingUrl,

    #[error("Error: Invalid \"url\" parameter provided.")]
    InvalidUrl,

    /// DNS, connect, TLS or body-streaming failure talking to the target
    #[error("Proxy Error: Could not reach target or process request - {0}")]
    Upstream(#[from] reqwest::Error),

    /// Failure after the upstream answered (reading a playlist, building the response)
    #[error("Proxy Error: Could not reach target or process request - {0}")]
    Body(String),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::AccessDenied => StatusCode::FORBIDDEN,
            ProxyError::MissingUrl | ProxyError::InvalidUrl => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) | ProxyError::Body(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            error!("{}", message);
        }

        // Wildcard origin so browser scripts can read the failure text
        (
            status,
            [
                (
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                ),
                (
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                ),
            ],
            message,
        )
            .into_response()
    }
}
