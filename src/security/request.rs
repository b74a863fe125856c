//! Request descriptor and client identity resolution.

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// The parts of an inbound request the guards look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDescriptor<'a> {
    pub method: &'a str,
    pub path: &'a str,
    /// Raw, undecoded query string without the leading `?`.
    pub query: &'a str,
    pub user_agent: &'a str,
    /// Resolved client identity (see [`client_identity`]).
    pub client_ip: &'a str,
}

/// Resolve the identity used to key per-client state.
///
/// Order: first hop of `X-Forwarded-For`, then `X-Real-IP`, then the peer
/// address of the connection. Falls back to `"unknown"` when none is available.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
