use crate::error::ProxyError;
use url::{Url, form_urlencoded};

/// Name of the query parameter carrying the target URL.
pub const TARGET_PARAM: &str = "url";

/// Extract and parse the target URL from a raw query string.
///
/// The first `url` pair wins. Any absolute URL with a host is accepted;
/// there is no scheme allow-list.
///
/// # Errors
/// - [`ProxyError::MissingUrl`] when the parameter is absent or empty
/// - [`ProxyError::InvalidUrl`] when it is not an absolute URL with a host
pub fn resolve_target(query: Option<&str>) -> Result<Url, ProxyError> {
    let raw = query
        .and_then(|q| {
            form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == TARGET_PARAM)
                .map(|(_, value)| value.into_owned())
        })
        .filter(|value| !value.is_empty())
        .ok_or(ProxyError::MissingUrl)?;

    let url = Url::parse(&raw).map_err(|_| ProxyError::InvalidUrl)?;

    if !url.has_host() {
        return Err(ProxyError::InvalidUrl);
    }

    Ok(url)
}
