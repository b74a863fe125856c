//! Request Shield Library
//!
//! Expiring cache, sliding-window rate limiter and threat-scoring registry,
//! plus the HTTP surface that puts them in front of a document API.

pub mod admin;
pub mod cache;
pub mod clock;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use cache::ExpiringStore;
pub use config::ShieldConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{SlidingWindowLimiter, ThreatRegistry};
