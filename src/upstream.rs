//! Outbound request to the target URL.
//!
//! [`upstream_headers`] derives the outbound header set from the inbound one
//! without touching the original map; [`UpstreamClient::fetch`] sends it.
//! Nothing here retries: a failed fetch surfaces immediately.

use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use reqwest::{Client, Response, redirect};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::ProxyError;

/// Browser identity presented to origins that block generic clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Maximum redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Largest inbound request body forwarded upstream.
pub const MAX_REQUEST_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Headers that reveal the original client address or that the request went
/// through a proxy.
const CLIENT_IP_HEADERS: &[&str] = &[
    "x-forwarded-for",
    "x-real-ip",
    "cf-connecting-ip",
    "true-client-ip",
    "fastly-client-ip",
];

/// Connection-scoped headers a proxy must not relay in either direction.
pub(crate) const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Build the outbound header set from the inbound headers.
///
/// Drops client-IP and hop-by-hop headers plus `Accept-Encoding` (bodies are
/// relayed as-is, so the origin must not compress) and pins `User-Agent` to
/// [`BROWSER_USER_AGENT`]. The inbound `Host` names the proxy, so it is
/// dropped too: the client derives `Host` from the target URL, and re-derives
/// it on every redirect hop.
pub fn upstream_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();

    for name in CLIENT_IP_HEADERS.iter().chain(HOP_BY_HOP_HEADERS) {
        headers.remove(*name);
    }
    headers.remove(header::ACCEPT_ENCODING);
    headers.remove(header::HOST);

    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_static(BROWSER_USER_AGENT),
    );

    headers
}

/// Thin wrapper over a pooled [`reqwest::Client`] configured for relaying.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: Client,
}

impl UpstreamClient {
    /// Redirects are followed, there is no timeout and no response cache.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self { client })
    }

    /// Send `method` to `target` with the given (already sanitised) headers.
    ///
    /// The inbound body is collected before sending, up to
    /// [`MAX_REQUEST_BODY_BYTES`]; an empty body is not attached.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Body`] if the client body cannot be read or
    /// exceeds the limit, and
    /// [`ProxyError::Upstream`] on DNS, connect, TLS or redirect failure.
    /// Non-2xx statuses are not errors; they are relayed to the caller.
    pub async fn fetch(
        &self,
        method: Method,
        headers: HeaderMap,
        body: Body,
        target: &Url,
    ) -> Result<Response, ProxyError> {
        let mut request = self
            .client
            .request(method.clone(), target.clone())
            .headers(headers);

        let bytes = to_bytes(body, MAX_REQUEST_BODY_BYTES)
            .await
            .map_err(|e| ProxyError::Body(format!("failed to read request body: {e}")))?;
        if !bytes.is_empty() {
            request = request.body(bytes);
        }

        let response = request.send().await.map_err(|e| {
            debug!("Upstream fetch failed for {} {}: {}", method, target, e);
            ProxyError::Upstream(e)
        })?;

        debug!(
            "Upstream {} {} answered {}",
            method,
            target,
            response.status()
        );

        Ok(response)
    }
}

/// True for connection-scoped headers that must not be relayed.
pub(crate) fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}
