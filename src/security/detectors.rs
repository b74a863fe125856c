//! Request pattern detectors.
//!
//! # Design Decisions
//! - Literal, case-insensitive substring checks against fixed lists
//! - No regex: matching cost is linear in input size and list length
//! - Detectors are stateless; per-identity counters are passed in

use std::fmt;
use std::time::{Duration, Instant};

use crate::security::RequestDescriptor;

/// Scanner and scripted-client user-agent fragments.
pub const SUSPICIOUS_USER_AGENTS: &[&str] = &[
    "sqlmap",
    "nikto",
    "nmap",
    "masscan",
    "zap",
    "burp",
    "w3af",
    "havij",
    "acunetix",
    "nessus",
    "openvas",
    "wget",
    "curl",
    "python-requests",
    "go-http-client",
];

/// Path fragments probed by scanners: admin panels, credentials, VCS metadata.
pub const SENSITIVE_PATHS: &[&str] = &[
    "/admin",
    "/login",
    "/api/auth",
    "/.env",
    "/config",
    "/backup",
    "/database",
    "/phpmyadmin",
    "/wp-admin",
    "/.git",
    "/.svn",
    "/robots.txt",
    "/sitemap.xml",
];

/// Query string fragments typical of injection attempts.
pub const INJECTION_SIGNATURES: &[&str] = &[
    // SQL
    "union",
    "select",
    "drop",
    "insert",
    // XSS
    "<script",
    "javascript:",
    "onload=",
    // path traversal
    "../",
    "..\\",
    "%2e%2e",
];

/// Everything a detector may look at for one observation.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub request: &'a RequestDescriptor<'a>,
    /// Requests seen from this identity, including the current one.
    pub request_count: u64,
    pub first_seen: Instant,
    pub now: Instant,
}

/// A heuristic that flags a request as suspicious.
pub trait Detector: Send + Sync + fmt::Debug {
    /// Stable name, reported in security events.
    fn name(&self) -> &'static str;

    fn detect(&self, observation: &Observation<'_>) -> bool;
}

/// Fires when an identity exceeds `max_requests` within `period` of first being seen.
#[derive(Debug, Clone)]
pub struct BurstDetector {
    max_requests: u64,
    period: Duration,
}

impl BurstDetector {
    pub fn new(max_requests: u64, period: Duration) -> Self {
        Self { max_requests, period }
    }
}

impl Default for BurstDetector {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(5 * 60))
    }
}

impl Detector for BurstDetector {
    fn name(&self) -> &'static str {
        "burst-frequency"
    }

    fn detect(&self, observation: &Observation<'_>) -> bool {
        observation.request_count > self.max_requests
            && observation.now.saturating_duration_since(observation.first_seen) < self.period
    }
}

/// Which request field a [`SubstringDetector`] inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    UserAgent,
    Path,
    Query,
}

impl Field {
    fn select<'a>(self, request: &RequestDescriptor<'a>) -> &'a str {
        match self {
            Field::UserAgent => request.user_agent,
            Field::Path => request.path,
            Field::Query => request.query,
        }
    }
}

/// Fires when one request field contains any needle, ignoring ASCII case.
#[derive(Debug, Clone)]
pub struct SubstringDetector {
    name: &'static str,
    field: Field,
    // Stored lowercase.
    needles: Vec<String>,
}

impl SubstringDetector {
    pub fn new(name: &'static str, field: Field, needles: &[&str]) -> Self {
        Self {
            name,
            field,
            needles: needles.iter().map(|n| n.to_ascii_lowercase()).collect(),
        }
    }

    pub fn suspicious_agent() -> Self {
        Self::new("suspicious-agent", Field::UserAgent, SUSPICIOUS_USER_AGENTS)
    }

    pub fn sensitive_path() -> Self {
        Self::new("sensitive-path", Field::Path, SENSITIVE_PATHS)
    }

    pub fn injection_signature() -> Self {
        Self::new("injection-signature", Field::Query, INJECTION_SIGNATURES)
    }
}

impl Detector for SubstringDetector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn detect(&self, observation: &Observation<'_>) -> bool {
        let haystack = self.field.select(observation.request);
        if haystack.is_empty() {
            return false;
        }
        let haystack = haystack.to_ascii_lowercase();
        self.needles.iter().any(|needle| haystack.contains(needle.as_str()))
    }
}

/// The standard detector set: burst, user agent, path, injection.
pub fn default_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(BurstDetector::default()),
        Box::new(SubstringDetector::suspicious_agent()),
        Box::new(SubstringDetector::sensitive_path()),
        Box::new(SubstringDetector::injection_signature()),
    ]
}
