//! Request-level guards: same-origin enforcement and client IP resolution.
//!
//! Every mutating endpoint runs behind both. Browsers send `Sec-Fetch-Site`
//! and `Origin`; non-browser clients send neither and pass the same-origin
//! check by default, which is fine - these guards exist to stop drive-by
//! cross-site form posts, not scripted clients (the gates handle those).

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use crate::{error::AppError, state::AppState};

/// Same-origin assertion for mutating endpoints.
///
/// Rejects when `Sec-Fetch-Site` names a cross-site fetch, or when an
/// `Origin` header disagrees with the `Host` the request arrived on.
pub struct SameOrigin;

pub fn require_same_origin(headers: &HeaderMap) -> Result<(), AppError> {
    if let Some(site) = headers.get("sec-fetch-site").and_then(|v| v.to_str().ok()) {
        // "none" is user-initiated navigation (address bar, bookmark)
        if !matches!(site, "same-origin" | "same-site" | "none") {
            return Err(AppError::Forbidden("Cross-origin request rejected"));
        }
    }

    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());

    if let (Some(origin), Some(host)) = (origin, host) {
        let origin_host = origin
            .strip_prefix("https://")
            .or_else(|| origin.strip_prefix("http://"))
            .unwrap_or(origin);

        if origin_host != host {
            return Err(AppError::Forbidden("Cross-origin request rejected"));
        }
    }

    Ok(())
}

impl FromRequestParts<AppState> for SameOrigin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_same_origin(&parts.headers)?;
        Ok(SameOrigin)
    }
}

/// Client IP as reported by the reverse proxy.
///
/// Production requires a resolvable IP; elsewhere unresolved falls back to
/// localhost so local development works without a proxy in front.
pub struct ClientIp(pub String);

fn resolve_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        // First hop is the client; later hops are proxies
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve_ip(&parts.headers) {
            Some(ip) => Ok(ClientIp(ip)),
            None if state.config.is_production() => {
                Err(AppError::Forbidden("Client IP could not be resolved"))
            }
            None => Ok(ClientIp("127.0.0.1".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn no_browser_headers_pass() {
        assert!(require_same_origin(&headers(&[])).is_ok());
    }

    #[test]
    fn same_origin_fetch_passes() {
        let h = headers(&[
            ("sec-fetch-site", "same-origin"),
            ("origin", "https://moltook.net"),
            ("host", "moltook.net"),
        ]);

        assert!(require_same_origin(&h).is_ok());
    }

    #[test]
    fn cross_site_fetch_is_rejected() {
        let h = headers(&[("sec-fetch-site", "cross-site")]);

        assert!(require_same_origin(&h).is_err());
    }

    #[test]
    fn mismatched_origin_is_rejected() {
        let h = headers(&[("origin", "https://evil.example"), ("host", "moltook.net")]);

        assert!(require_same_origin(&h).is_err());
    }

    #[test]
    fn user_navigation_passes() {
        let h = headers(&[("sec-fetch-site", "none")]);

        assert!(require_same_origin(&h).is_ok());
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let h = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);

        assert_eq!(resolve_ip(&h), Some("203.0.113.7".to_string()));
    }

    #[test]
    fn real_ip_is_fallback() {
        let h = headers(&[("x-real-ip", "203.0.113.9")]);

        assert_eq!(resolve_ip(&h), Some("203.0.113.9".to_string()));
    }

    #[test]
    fn no_ip_headers_resolve_to_none() {
        assert_eq!(resolve_ip(&headers(&[])), None);
    }
}
