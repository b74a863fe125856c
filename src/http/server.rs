//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared application state from `ShieldConfig`
//! - Create the Axum router with all handlers
//! - Wire up middleware (guards, headers, limits, timeout, request ID, tracing)
//! - Own the background tasks (sweepers, log rotation) for the server's lifetime
//! - Serve until the shutdown broadcast fires

use axum::{
    http::HeaderName,
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::cache::ExpiringStore;
use crate::clock::{self, Clock};
use crate::config::ShieldConfig;
use crate::http::documents;
use crate::http::middleware::guard_middleware;
use crate::lifecycle::{spawn_periodic, spawn_sweeper, Shutdown};
use crate::observability::{EventSink, LogRotator};
use crate::security::{headers, Guards};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub guards: Arc<Guards>,
    pub documents: Arc<ExpiringStore<Value>>,
    pub rotator: Arc<LogRotator>,
    pub admin_key: Option<Arc<str>>,
}

impl AppState {
    pub fn from_config(config: &ShieldConfig, sink: Arc<dyn EventSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            guards: Arc::new(Guards::with_clock(config, sink, clock.clone())),
            documents: Arc::new(ExpiringStore::with_clock(config.cache.ttl(), clock)),
            rotator: Arc::new(LogRotator::from_config(&config.logs)),
            admin_key: config.admin.api_key.as_deref().map(Arc::from),
        }
    }
}

/// HTTP server for the request shield.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: ShieldConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ShieldConfig, sink: Arc<dyn EventSink>) -> Self {
        Self::with_clock(config, sink, clock::system())
    }

    pub fn with_clock(config: ShieldConfig, sink: Arc<dyn EventSink>, clock: Arc<dyn Clock>) -> Self {
        let state = AppState::from_config(&config, sink, clock);
        let router = Self::build_router(&config, state.clone());
        Self { router, state, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ShieldConfig, state: AppState) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        let guarded = Router::new()
            .route("/documents", get(documents::list_documents))
            .route(
                "/documents/{id}",
                get(documents::get_document)
                    .put(documents::put_document)
                    .delete(documents::delete_document),
            )
            .merge(setup_admin_router(state.clone()))
            .route_layer(middleware::from_fn_with_state(
                state.guards.clone(),
                guard_middleware,
            ));

        let router = Router::new()
            .route("/health", get(health))
            .merge(guarded)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid));

        headers::apply(router, &config.security)
    }

    /// A clone of the fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    /// Start every sweeper plus the log rotation task.
    pub fn spawn_background_tasks(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let mut tasks = self.state.guards.spawn_sweepers(&self.config, shutdown);

        tasks.push(spawn_sweeper(
            "cache",
            self.state.documents.clone(),
            self.config.cache.sweep_interval(),
            shutdown.subscribe(),
        ));

        let rotator = self.state.rotator.clone();
        tasks.push(spawn_periodic(
            "log_rotation",
            self.config.logs.interval(),
            shutdown.subscribe(),
            move || match rotator.rotate() {
                Ok(0) => {}
                Ok(rotated) => tracing::info!(rotated, dir = ?rotator.dir(), "Rotated log files"),
                Err(e) => tracing::error!(dir = ?rotator.dir(), error = %e, "Log rotation failed"),
            },
        ));

        tasks
    }

    /// Run the server on `listener` until `shutdown` fires, then stop the
    /// background tasks.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let tasks = self.spawn_background_tasks(&shutdown);
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(Shutdown::wait(shutdown.subscribe()))
            .await;

        // Also stops the sweepers if serving failed on its own.
        shutdown.trigger();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task failed to stop cleanly");
            }
        }

        result?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
