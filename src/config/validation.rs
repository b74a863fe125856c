//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows, intervals, limits > 0)
//! - Validate socket addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ShieldConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ShieldConfig;
use crate::lifecycle::sweeper::MAX_PERIOD;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("{field}: unknown log level {value:?}")]
    InvalidLogLevel { field: &'static str, value: String },

    #[error("admin.api_key must not be empty when set")]
    EmptyApiKey,
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for lifetimes and windows: ten years.
pub const MAX_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Upper bound for task intervals and timeouts, matching the sweeper clamp.
pub const MAX_INTERVAL_SECS: u64 = MAX_PERIOD.as_secs();

/// Check `config` for semantic errors.
pub fn validate_config(config: &ShieldConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let positive: [(&'static str, u64); 10] = [
        ("cache.ttl_secs", config.cache.ttl_secs),
        ("cache.sweep_interval_secs", config.cache.sweep_interval_secs),
        ("rate_limit.max_requests", config.rate_limit.max_requests as u64),
        ("rate_limit.window_secs", config.rate_limit.window_secs),
        ("rate_limit.sweep_interval_secs", config.rate_limit.sweep_interval_secs),
        ("threats.idle_ttl_secs", config.threats.idle_ttl_secs),
        ("threats.sweep_interval_secs", config.threats.sweep_interval_secs),
        ("logs.max_files", config.logs.max_files as u64),
        ("logs.interval_secs", config.logs.interval_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }
    let bounded: [(&'static str, u64, u64); 8] = [
        ("cache.ttl_secs", config.cache.ttl_secs, MAX_LIFETIME_SECS),
        ("rate_limit.window_secs", config.rate_limit.window_secs, MAX_LIFETIME_SECS),
        ("threats.idle_ttl_secs", config.threats.idle_ttl_secs, MAX_LIFETIME_SECS),
        ("cache.sweep_interval_secs", config.cache.sweep_interval_secs, MAX_INTERVAL_SECS),
        ("rate_limit.sweep_interval_secs", config.rate_limit.sweep_interval_secs, MAX_INTERVAL_SECS),
        ("threats.sweep_interval_secs", config.threats.sweep_interval_secs, MAX_INTERVAL_SECS),
        ("logs.interval_secs", config.logs.interval_secs, MAX_INTERVAL_SECS),
        ("timeouts.request_secs", config.timeouts.request_secs, MAX_INTERVAL_SECS),
    ];
    for (field, value, max) in bounded {
        if value > max {
            errors.push(ValidationError::TooLarge { field, max });
        }
    }
    if config.logs.max_size_bytes == 0 {
        errors.push(ValidationError::Zero { field: "logs.max_size_bytes" });
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::Zero { field: "security.max_body_size" });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel {
            field: "observability.log_level",
            value: config.observability.log_level.clone(),
        });
    }

    if config.admin.api_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
        errors.push(ValidationError::EmptyApiKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
