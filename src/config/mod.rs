//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ShieldConfig (validated, immutable)
//!     → read once at startup to build guards, stores and the router
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, CacheConfig, ListenerConfig, LogFormat, LogRotationConfig, ObservabilityConfig,
    RateLimitConfig, SecurityConfig, ShieldConfig, ThreatConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
