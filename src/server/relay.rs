//! Upstream → client response relay.
//!
//! Two explicit paths: [`stream_response`] forwards the body chunk by chunk
//! without buffering, [`rewrite_response`] buffers an M3U8 body and rewrites
//! it. Both copy status and headers the same way and add the CORS headers.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, header},
    response::Response,
};
use futures_util::TryStreamExt;
use tracing::{debug, warn};
use url::Url;

use crate::{error::Result, hls, upstream::is_hop_by_hop};

/// CORS headers set on every relayed response, independent of the access
/// gate. The gate decides who may use the proxy; these decide what the
/// caller's browser may read.
pub const CORS_HEADERS: &[(&str, &str)] = &[
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET, HEAD, POST, OPTIONS"),
    (
        "access-control-allow-headers",
        "Content-Type, Range, Authorization, Origin, Referer, User-Agent",
    ),
    (
        "access-control-expose-headers",
        "Content-Length, Content-Range, Accept-Ranges, X-Content-Type-Options, ETag, Link",
    ),
];

/// Overwrite the CORS headers on `headers`.
pub fn apply_cors(headers: &mut HeaderMap) {
    for (name, value) in CORS_HEADERS {
        headers.insert(*name, HeaderValue::from_static(*value));
    }
}

/// Copy upstream headers for the client: hop-by-hop headers dropped,
/// `Content-Type` re-set from upstream, CORS headers added.
pub fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();

    let hop_by_hop: Vec<_> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in hop_by_hop {
        headers.remove(name);
    }

    if let Some(content_type) = upstream.get(header::CONTENT_TYPE) {
        headers.insert(header::CONTENT_TYPE, content_type.clone());
    }

    apply_cors(&mut headers);
    headers
}

/// Content-Type of an upstream response, if it is valid text.
pub fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

/// True when the upstream response carries an M3U8 playlist.
pub fn is_playlist(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(hls::is_playlist_content_type)
}

/// Relay headers for a rewritten playlist. Length and validators describe
/// the upstream bytes, not the rewritten body, so they are dropped.
pub fn rewritten_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = relay_headers(upstream);
    for name in [
        header::CONTENT_LENGTH,
        header::ETAG,
        header::LAST_MODIFIED,
    ] {
        headers.remove(name);
    }
    headers
}

/// Relay the upstream body as a stream.
///
/// Dropping the returned body (client gone) drops the upstream response and
/// closes its connection.
pub fn stream_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let headers = relay_headers(upstream.headers());
    let url = upstream.url().clone();

    let stream = upstream
        .bytes_stream()
        .inspect_err(move |e| warn!("Upstream body from {} failed mid-stream: {}", url, e));

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Buffer an M3U8 body, rewrite its URI lines through `proxy_base`, and relay it.
///
/// # Errors
/// Returns [`crate::error::ProxyError::Upstream`] if the body cannot be read.
pub async fn rewrite_response(
    upstream: reqwest::Response,
    target: &Url,
    proxy_base: &str,
) -> Result<Response> {
    let status = upstream.status();
    let headers = rewritten_headers(upstream.headers());

    let text = upstream.text().await?;
    debug!("Fetched playlist {} ({} bytes)", target, text.len());

    let (rewritten, _) = hls::rewrite_playlist(&text, target, proxy_base);

    let mut response = Response::new(Body::from(rewritten));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
