//! Guard middleware.
//! Runs threat analysis and rate limiting in front of every guarded route.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::security::{client_identity, Guards, RequestDescriptor, Verdict};

pub async fn guard_middleware(
    State(guards): State<Arc<Guards>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let verdict = {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let identity = client_identity(request.headers(), peer);
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        guards.check(&RequestDescriptor {
            method: request.method().as_str(),
            path: request.uri().path(),
            query: request.uri().query().unwrap_or_default(),
            user_agent,
            client_ip: &identity,
        })
    };

    match verdict {
        Verdict::Pass => next.run(request).await,
        Verdict::Denied => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "ACCESS_DENIED",
                "message": "Access denied",
            })),
        )
            .into_response(),
        Verdict::Throttled { retry_after } => {
            let seconds = retry_after_secs(retry_after);
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "RATE_LIMIT_EXCEEDED",
                    "message": "Too many requests",
                    "retry_after_seconds": seconds,
                })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
            response
        }
    }
}

/// Whole seconds, rounded up, never zero.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_secs(45)), 45);
        assert_eq!(retry_after_secs(Duration::from_millis(44_100)), 45);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }
}
