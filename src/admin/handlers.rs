use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::http::server::AppState;
use crate::observability::LogStats;
use crate::security::{RateLimitStats, ThreatStats};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub tracked_identities: usize,
    pub cached_documents: usize,
}

/// Aggregate view over every guard and store.
#[derive(Debug, Serialize)]
pub struct SecurityStats {
    pub threats: ThreatStats,
    pub rate_limits: RateLimitStats,
    pub logs: LogStats,
    pub cache: CacheStats,
    pub timestamp: DateTime<Utc>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        tracked_identities: state.guards.threats().stats().total_suspicious_identities,
        cached_documents: state.documents.count(),
    })
}

pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<SecurityStats>, (StatusCode, String)> {
    let logs = state.rotator.stats().map_err(|e| {
        tracing::error!(dir = ?state.rotator.dir(), error = %e, "Failed to read log directory");
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read log statistics".to_string())
    })?;

    Ok(Json(SecurityStats {
        threats: state.guards.threats().stats(),
        rate_limits: state.guards.limiter().stats(),
        logs,
        cache: state.documents.stats(),
        timestamp: Utc::now(),
    }))
}
