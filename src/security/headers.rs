//! Security response headers.
//!
//! # Responsibilities
//! - Build the hardening header set from `SecurityConfig`
//! - Attach it to every response, including guard rejections
//!
//! # Design Decisions
//! - Headers already set by a handler are left alone
//! - An unparsable CSP policy is logged and skipped rather than failing startup

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::SecurityConfig;

const STATIC_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-permitted-cross-domain-policies", "none"),
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET, POST, PUT, DELETE, OPTIONS"),
    ("access-control-allow-headers", "Content-Type, Authorization, X-Requested-With"),
    ("access-control-max-age", "86400"),
];

/// The header set for `config`. Empty when headers are disabled.
pub fn security_headers(config: &SecurityConfig) -> Vec<(HeaderName, HeaderValue)> {
    if !config.enable_headers {
        return Vec::new();
    }

    let mut headers: Vec<_> = STATIC_HEADERS
        .iter()
        .map(|&(name, value)| (HeaderName::from_static(name), HeaderValue::from_static(value)))
        .collect();

    if config.enable_csp {
        match HeaderValue::from_str(&config.csp_policy) {
            Ok(value) => headers.push((HeaderName::from_static("content-security-policy"), value)),
            Err(e) => tracing::warn!(error = %e, "Invalid CSP policy, header not set"),
        }
    }

    headers
}

/// Layer the security headers onto `router`.
pub fn apply<S>(router: Router<S>, config: &SecurityConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    security_headers(config)
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(name, value))
        })
}
