//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, body limit, tracing)
//!     → middleware/guard.rs (threat analysis, rate limiting)
//!     → documents.rs | admin (handlers)
//!     → security headers on the response
//!     → Send to client
//! ```

pub mod documents;
pub mod middleware;
pub mod server;

pub use server::{AppState, HttpServer, X_REQUEST_ID};
