//! Expiring key-value cache.
//!
//! # Data Flow
//! ```text
//! Set(key, value)        → entry stamped with expires_at = now + ttl
//! Get/Exists/GetAll/Count → shared lock, expired entries treated as absent
//! sweeper (every 5 min)  → exclusive lock, expired entries physically removed
//! ```
//!
//! # Design Decisions
//! - TTL is a store-wide policy fixed at construction, not per write
//! - Reads never mutate; reclamation is deferred to the sweep
//! - Stats distinguish live entries from stale ones awaiting the sweep

pub mod store;

pub use store::{CacheStats, ExpiringStore};
