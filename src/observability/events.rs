//! Security event stream.
//!
//! # Responsibilities
//! - Define the `SecurityEvent` record emitted by the guards
//! - Deliver events to a pluggable `EventSink`
//!
//! # Design Decisions
//! - Sinks never fail the caller; delivery problems are logged and dropped
//! - One JSON object per line so the file can be tailed and shipped as-is

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::security::RequestDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    SuspiciousActivity,
    RateLimitExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A single security-relevant observation about one request.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub ip_address: String,
    pub user_agent: String,
    pub request_path: String,
    pub method: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl SecurityEvent {
    fn from_request(
        request: &RequestDescriptor<'_>,
        event_type: EventType,
        severity: Severity,
        message: String,
        details: Map<String, Value>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            ip_address: request.client_ip.to_string(),
            user_agent: request.user_agent.to_string(),
            request_path: request.path.to_string(),
            method: request.method.to_string(),
            severity,
            message,
            details,
        }
    }

    /// A request tripped at least one threat detector.
    pub fn suspicious_activity(request: &RequestDescriptor<'_>, details: Map<String, Value>) -> Self {
        Self::from_request(
            request,
            EventType::SuspiciousActivity,
            Severity::High,
            "Suspicious pattern detected".to_string(),
            details,
        )
    }

    /// A request was throttled by the sliding-window limiter.
    pub fn rate_limit_exceeded(request: &RequestDescriptor<'_>, limit: usize) -> Self {
        let mut details = Map::new();
        details.insert("rate_limit".to_string(), Value::from(limit));
        Self::from_request(
            request,
            EventType::RateLimitExceeded,
            Severity::Medium,
            format!("Rate limit exceeded: {limit} requests"),
            details,
        )
    }
}

/// Destination for security events.
pub trait EventSink: Send + Sync + fmt::Debug {
    fn emit(&self, event: &SecurityEvent);
}

/// Emits events as structured `tracing` records on the `security` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &SecurityEvent) {
        let details = Value::Object(event.details.clone());
        tracing::warn!(
            target: "security",
            event_type = ?event.event_type,
            severity = ?event.severity,
            ip = %event.ip_address,
            method = %event.method,
            path = %event.request_path,
            user_agent = %event.user_agent,
            details = %details,
            "{}",
            event.message
        );
    }
}

/// Appends each event as one JSON line to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating it and its parent directory if needed.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonLinesSink {
    fn emit(&self, event: &SecurityEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize security event");
                return;
            }
        };

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        // The rotator renames the file out from under us; start a fresh one.
        if !self.path.exists() {
            match OpenOptions::new().create(true).append(true).open(&self.path) {
                Ok(reopened) => *file = reopened,
                Err(e) => tracing::error!(path = ?self.path, error = %e, "Failed to reopen security log"),
            }
        }
        if let Err(e) = writeln!(file, "{line}") {
            tracing::error!(path = ?self.path, error = %e, "Failed to write security event");
        }
    }
}
