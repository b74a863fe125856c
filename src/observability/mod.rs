//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Guards produce:
//!     → events.rs (SecurityEvent → EventSink: tracing target or JSON-lines file)
//!     → rotation.rs (keeps the security log directory bounded)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Security events are a separate stream from operational logs
//! - Metrics are cheap (atomic increments) and optional to export

pub mod events;
pub mod logging;
pub mod metrics;
pub mod rotation;

pub use events::{EventSink, EventType, JsonLinesSink, SecurityEvent, Severity, TracingSink};
pub use rotation::{LogRotator, LogStats};
