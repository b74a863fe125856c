pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::{get_stats, get_status};
use crate::http::server::AppState;

/// Operator routes, behind bearer auth when an API key is configured.
///
/// Kept under `/security` so polling them never matches a sensitive-path detector.
pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/security/status", get(get_status))
        .route("/security/stats", get(get_stats))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
