use crate::{
    error::{ProxyError, Result},
    metrics,
    server::{relay, state::AppState, target::resolve_target},
    upstream::upstream_headers,
};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, Uri, header},
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::info;

/// Proxy any request to the URL named by its `url` query parameter.
///
/// Registered as the router fallback, so every method and path ends up here
/// once the access gate has let the request through. Playlists are buffered
/// and rewritten; everything else streams straight through.
pub async fn proxy_request(State(state): State<AppState>, req: Request) -> Response {
    let start = Instant::now();

    let (kind, response) = match relay_target(&state, req).await {
        Ok(ok) => ok,
        Err(e) => {
            if matches!(e, ProxyError::Upstream(_) | ProxyError::Body(_)) {
                metrics::record_upstream_error();
            }
            ("error", e.into_response())
        }
    };

    metrics::record_request(kind, response.status().as_u16());
    metrics::record_duration(kind, start);

    response
}

async fn relay_target(state: &AppState, req: Request) -> Result<(&'static str, Response)> {
    let (parts, body) = req.into_parts();

    let target = resolve_target(parts.uri.query())?;
    info!("Proxying request to: {}", target);

    let headers = upstream_headers(&parts.headers);
    let upstream = state
        .upstream
        .fetch(parts.method.clone(), headers, body, &target)
        .await?;

    // HEAD has no body to rewrite
    if parts.method != Method::HEAD && relay::is_playlist(upstream.headers()) {
        let base = proxy_base(
            state.config.base_url.as_deref(),
            &parts.uri,
            &parts.headers,
        );
        let response = relay::rewrite_response(upstream, &target, &base).await?;
        Ok(("playlist", response))
    } else {
        Ok(("passthrough", relay::stream_response(upstream)))
    }
}

/// The proxy's own `scheme://host/path`, without query, for rewritten links.
///
/// Preference order: configured `base_url`, an absolute-form request URI,
/// then the `Host` header with the scheme from `X-Forwarded-Proto`
/// (default `https`).
pub fn proxy_base(base_url: Option<&str>, uri: &Uri, headers: &HeaderMap) -> String {
    let path = uri.path();

    if let Some(base) = base_url {
        return format!("{}{}", base.trim_end_matches('/'), path);
    }

    if let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) {
        return format!("{}://{}{}", scheme, authority, path);
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("https");

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}{}", scheme, host, path)
}
