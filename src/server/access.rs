//! Origin/Referer access gate.
//!
//! Only browsers embedding the proxy from the allowed host (or one of its
//! subdomains) may use it. Both headers are trivially spoofable by non-browser
//! clients, so this keeps casual hotlinkers out rather than providing real
//! authentication.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};
use url::Url;

use super::state::AppState;
use crate::{error::ProxyError, metrics};

/// Lowercase hostname that callers must match. Never empty, never carries a
/// scheme, port or path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowedHost(String);

impl AllowedHost {
    /// Derive the host from a full origin string such as `https://example.com/page`.
    ///
    /// Returns `None` if the string is not an absolute URL with a non-empty host.
    pub fn from_origin(origin: &str) -> Option<Self> {
        let host = Url::parse(origin).ok()?.host_str()?.to_ascii_lowercase();
        if host.is_empty() {
            return None;
        }
        Some(Self(host))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact match or subdomain match (`cdn.example.com` for `example.com`).
    pub fn matches(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        host == self.0
            || host
                .strip_suffix(self.0.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

/// Which request header granted access
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessSignal {
    Origin,
    Referer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed(AccessSignal),
    Denied,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed(_))
    }
}

/// Decides whether a request may use the proxy.
#[derive(Clone, Debug)]
pub struct AccessGate {
    allowed: AllowedHost,
}

impl AccessGate {
    pub fn new(allowed: AllowedHost) -> Self {
        Self { allowed }
    }

    pub fn allowed_host(&self) -> &AllowedHost {
        &self.allowed
    }

    /// `Origin` is authoritative when it grants access; `Referer` is only
    /// consulted as a fallback. Unparsable values count as absent.
    pub fn decide(&self, headers: &HeaderMap) -> AccessDecision {
        if self.header_matches(headers, header::ORIGIN) {
            return AccessDecision::Allowed(AccessSignal::Origin);
        }
        if self.header_matches(headers, header::REFERER) {
            return AccessDecision::Allowed(AccessSignal::Referer);
        }
        AccessDecision::Denied
    }

    fn header_matches(&self, headers: &HeaderMap, name: header::HeaderName) -> bool {
        headers
            .get(&name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Url::parse(v).ok())
            .and_then(|url| url.host_str().map(|h| self.allowed.matches(h)))
            .unwrap_or(false)
    }
}

/// Axum middleware: reject requests that do not come from the allowed host.
pub async fn access_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let decision = state.access_gate.decide(req.headers());

    match decision {
        AccessDecision::Allowed(signal) => {
            debug!("Access granted via {:?}", signal);
            next.run(req).await
        }
        AccessDecision::Denied => {
            warn!(
                "Access denied for {} {} (origin: {:?}, referer: {:?})",
                req.method(),
                req.uri().path(),
                req.headers().get(header::ORIGIN),
                req.headers().get(header::REFERER)
            );
            metrics::record_access_denied();
            ProxyError::AccessDenied.into_response()
        }
    }
}
