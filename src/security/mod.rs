//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → request.rs (resolve client identity, build RequestDescriptor)
//!     → threat.rs (score with detectors.rs, deny blocked identities)
//!     → rate_limit.rs (sliding window per identity)
//!     → handler
//!     → headers.rs (hardening headers on the response)
//! ```
//!
//! # Design Decisions
//! - Each guard owns one independently locked map
//! - Policy outcomes are return values, not errors
//! - No trust in client input: all matching is on raw, undecoded text

pub mod detectors;
pub mod guard;
pub mod headers;
pub mod rate_limit;
pub mod request;
pub mod threat;

pub use guard::{Guards, Verdict};
pub use rate_limit::{Admission, RateLimitStats, SlidingWindowLimiter};
pub use request::{client_identity, RequestDescriptor};
pub use threat::{ThreatLevel, ThreatRecord, ThreatRegistry, ThreatStats};
