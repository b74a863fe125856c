//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the shield.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the request shield.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ShieldConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Document cache settings.
    pub cache: CacheConfig,

    /// Sliding-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Threat scoring.
    pub threats: ThreatConfig,

    /// Security log rotation.
    pub logs: LogRotationConfig,

    /// Response hardening and request limits.
    pub security: SecurityConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Operator endpoints.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Expiring document cache.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of every write in seconds.
    pub ttl_secs: u64,

    /// Interval between sweeps of expired entries.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 5 * 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum admitted requests per identity within one window.
    pub max_requests: usize,

    /// Trailing window length in seconds.
    pub window_secs: u64,

    /// Interval between sweeps of idle identities.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_secs: 60,
            sweep_interval_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Threat scoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThreatConfig {
    /// Enable threat analysis.
    pub enabled: bool,

    /// Records idle longer than this are forgotten.
    pub idle_ttl_secs: u64,

    /// Interval between sweeps of idle records.
    pub sweep_interval_secs: u64,

    /// Append security events as JSON lines to this file.
    /// When unset, events go to the `security` tracing target.
    pub event_log: Option<PathBuf>,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 60 * 60,
            event_log: None,
        }
    }
}

impl ThreatConfig {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Log directory rotation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogRotationConfig {
    /// Directory holding `*.log` files.
    pub dir: PathBuf,

    /// Maximum number of `.log` files kept.
    pub max_files: usize,

    /// Size in bytes past which an active file is rotated.
    pub max_size_bytes: u64,

    /// Also rotate active files older than a day.
    pub rotate_daily: bool,

    /// Interval between rotation passes.
    pub interval_secs: u64,
}

impl Default for LogRotationConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            max_files: 10,
            max_size_bytes: 10 * 1024 * 1024,
            rotate_daily: true,
            interval_secs: 60 * 60,
        }
    }
}

impl LogRotationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Add a Content-Security-Policy header.
    pub enable_csp: bool,
    /// Policy value used when `enable_csp` is set.
    pub csp_policy: String,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            enable_csp: true,
            csp_policy: "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; \
                         img-src 'self' data:; connect-src 'self'; frame-ancestors 'none'"
                .to_string(),
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Operator endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token required by `/security/stats`. Open when unset.
    pub api_key: Option<String>,
}
