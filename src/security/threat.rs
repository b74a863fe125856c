//! Per-identity threat scoring.
//!
//! # State Machine
//! ```text
//! LOW ──(suspicious ≥ 5)──▶ MEDIUM ──(suspicious ≥ 10)──▶ HIGH + blocked
//! ```
//! Levels only rise while a record exists. The hourly sweep drops records
//! idle for more than a day, which is the only way back to LOW.
//!
//! # Design Decisions
//! - `level` and `blocked` are separate fields; denial requires both
//! - Events are emitted after the registry lock is released

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::clock::{self, Clock};
use crate::lifecycle::sweeper::Sweep;
use crate::observability::metrics;
use crate::observability::{EventSink, SecurityEvent};
use crate::security::detectors::{default_detectors, Detector, Observation};
use crate::security::RequestDescriptor;

/// Default idle period after which a record is forgotten.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::High => "HIGH",
        }
    }
}

/// Everything the registry knows about one identity.
#[derive(Debug, Clone)]
pub struct ThreatRecord {
    identity: String,
    first_seen: Instant,
    last_seen: Instant,
    request_count: u64,
    suspicious_count: u64,
    level: ThreatLevel,
    blocked: bool,
}

impl ThreatRecord {
    fn new(identity: &str, now: Instant) -> Self {
        Self {
            identity: identity.to_owned(),
            first_seen: now,
            last_seen: now,
            request_count: 0,
            suspicious_count: 0,
            level: ThreatLevel::Low,
            blocked: false,
        }
    }

    /// Re-derive level and block flag from the suspicious counter.
    fn escalate(&mut self) {
        if self.suspicious_count >= 10 {
            self.level = ThreatLevel::High;
            self.blocked = true;
        } else if self.suspicious_count >= 5 {
            self.level = ThreatLevel::Medium;
        } else if self.suspicious_count >= 2 {
            self.level = ThreatLevel::Low;
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn first_seen(&self) -> Instant {
        self.first_seen
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn suspicious_count(&self) -> u64 {
        self.suspicious_count
    }

    pub fn level(&self) -> ThreatLevel {
        self.level
    }

    pub fn blocked(&self) -> bool {
        self.blocked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatStats {
    pub total_suspicious_identities: usize,
    pub high_threats: usize,
    pub medium_threats: usize,
    pub low_threats: usize,
    pub blocked_identities: usize,
}

/// Threat-scoring registry keyed by client identity.
#[derive(Debug)]
pub struct ThreatRegistry {
    records: RwLock<HashMap<String, ThreatRecord>>,
    detectors: Vec<Box<dyn Detector>>,
    sink: Arc<dyn EventSink>,
    idle_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ThreatRegistry {
    /// Registry with the default detectors, a 24h idle TTL and the system clock.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            detectors: default_detectors(),
            sink,
            idle_ttl: DEFAULT_IDLE_TTL,
            clock: clock::system(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub fn with_detectors(mut self, detectors: Vec<Box<dyn Detector>>) -> Self {
        self.detectors = detectors;
        self
    }

    /// Score one request. Returns true if the identity must be denied.
    pub fn analyze(&self, request: &RequestDescriptor<'_>) -> bool {
        let (deny, event) = {
            let mut records = self.write();
            let now = self.clock.now();
            let record = records
                .entry(request.client_ip.to_owned())
                .or_insert_with(|| ThreatRecord::new(request.client_ip, now));

            record.last_seen = now;
            record.request_count += 1;

            let observation = Observation {
                request,
                request_count: record.request_count,
                first_seen: record.first_seen,
                now,
            };
            let fired: Vec<&'static str> = self
                .detectors
                .iter()
                .filter(|detector| detector.detect(&observation))
                .map(|detector| detector.name())
                .collect();

            let event = if fired.is_empty() {
                None
            } else {
                Some(self.flag(record, request, fired))
            };

            (record.level == ThreatLevel::High && record.blocked, event)
        };

        if let Some(event) = event {
            self.sink.emit(&event);
        }
        deny
    }

    fn flag(
        &self,
        record: &mut ThreatRecord,
        request: &RequestDescriptor<'_>,
        fired: Vec<&'static str>,
    ) -> SecurityEvent {
        let previous = (record.level, record.blocked);
        record.suspicious_count += 1;
        record.escalate();

        if (record.level, record.blocked) != previous {
            metrics::record_threat_escalation(record.level.as_str());
            tracing::warn!(
                identity = %record.identity,
                level = record.level.as_str(),
                blocked = record.blocked,
                suspicious_count = record.suspicious_count,
                "Threat level raised"
            );
        }

        let mut details = Map::new();
        details.insert("threat_level".to_string(), Value::from(record.level.as_str()));
        details.insert("request_count".to_string(), Value::from(record.request_count));
        details.insert("suspicious_count".to_string(), Value::from(record.suspicious_count));
        details.insert("detectors".to_string(), Value::from(fired));
        SecurityEvent::suspicious_activity(request, details)
    }

    /// Snapshot of the record for `identity`, if tracked.
    pub fn record(&self, identity: &str) -> Option<ThreatRecord> {
        self.read().get(identity).cloned()
    }

    pub fn stats(&self) -> ThreatStats {
        let records = self.read();
        let mut stats = ThreatStats {
            total_suspicious_identities: records.len(),
            high_threats: 0,
            medium_threats: 0,
            low_threats: 0,
            blocked_identities: 0,
        };
        for record in records.values() {
            match record.level {
                ThreatLevel::High => stats.high_threats += 1,
                ThreatLevel::Medium => stats.medium_threats += 1,
                ThreatLevel::Low => stats.low_threats += 1,
            }
            if record.blocked {
                stats.blocked_identities += 1;
            }
        }
        stats
    }

    /// Forget identities idle for longer than the idle TTL. Returns records removed.
    pub fn sweep(&self) -> usize {
        let mut records = self.write();
        let now = self.clock.now();
        let before = records.len();
        records.retain(|_, record| now.saturating_duration_since(record.last_seen) <= self.idle_ttl);
        before - records.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ThreatRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ThreatRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sweep for ThreatRegistry {
    fn sweep(&self) -> usize {
        ThreatRegistry::sweep(self)
    }

    fn tracked(&self) -> usize {
        self.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingSink {
        events: Mutex<Vec<SecurityEvent>>,
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: &SecurityEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn registry() -> (ThreatRegistry, Arc<RecordingSink>, Arc<ManualClock>) {
        let sink = Arc::new(RecordingSink::default());
        let clock = ManualClock::shared();
        let registry = ThreatRegistry::new(sink.clone()).with_clock(clock.clone());
        (registry, sink, clock)
    }

    fn request<'a>(ip: &'a str, path: &'a str, query: &'a str) -> RequestDescriptor<'a> {
        RequestDescriptor {
            method: "GET",
            path,
            query,
            user_agent: "Mozilla/5.0",
            client_ip: ip,
        }
    }

    #[test]
    fn test_union_select_counts_once() {
        let (registry, sink, _clock) = registry();
        let blocked = registry.analyze(&request("1.2.3.4", "/documents", "q=1' UNION SELECT * FROM users"));
        assert!(!blocked);

        let record = registry.record("1.2.3.4").unwrap();
        assert_eq!(record.request_count(), 1);
        assert_eq!(record.suspicious_count(), 1);
        assert_eq!(record.level(), ThreatLevel::Low);

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ip_address, "1.2.3.4");
        assert_eq!(events[0].details["suspicious_count"], 1);
        assert_eq!(events[0].details["detectors"], serde_json::json!(["injection-signature"]));
    }

    #[test]
    fn test_clean_request_is_tracked_without_event() {
        let (registry, sink, _clock) = registry();
        assert!(!registry.analyze(&request("5.6.7.8", "/documents", "page=1")));

        let record = registry.record("5.6.7.8").unwrap();
        assert_eq!(record.request_count(), 1);
        assert_eq!(record.suspicious_count(), 0);
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_several_detectors_still_count_once() {
        let (registry, sink, _clock) = registry();
        let req = RequestDescriptor {
            user_agent: "sqlmap/1.7",
            ..request("9.9.9.9", "/admin", "id=1 union select")
        };
        registry.analyze(&req);

        assert_eq!(registry.record("9.9.9.9").unwrap().suspicious_count(), 1);
        let events = sink.events.lock().unwrap();
        assert_eq!(
            events[0].details["detectors"],
            serde_json::json!(["suspicious-agent", "sensitive-path", "injection-signature"])
        );
    }

    #[test]
    fn test_escalation_is_monotonic_and_blocks_at_ten() {
        let (registry, _sink, _clock) = registry();
        let mut previous = ThreatLevel::Low;

        for n in 1..=12u64 {
            let denied = registry.analyze(&request("6.6.6.6", "/.env", ""));
            let record = registry.record("6.6.6.6").unwrap();
            assert_eq!(record.suspicious_count(), n);
            assert!(record.level() >= previous);
            previous = record.level();

            let expected = match n {
                0..=4 => ThreatLevel::Low,
                5..=9 => ThreatLevel::Medium,
                _ => ThreatLevel::High,
            };
            assert_eq!(record.level(), expected, "after {n} suspicious requests");
            assert_eq!(record.blocked(), n >= 10);
            assert_eq!(denied, n >= 10);
        }

        // Clean traffic from a blocked identity stays blocked.
        assert!(registry.analyze(&request("6.6.6.6", "/documents", "")));
    }

    #[test]
    fn test_burst_detection() {
        let (registry, _sink, clock) = registry();
        for _ in 0..100 {
            registry.analyze(&request("7.7.7.7", "/documents", ""));
            clock.advance(Duration::from_millis(100));
        }
        assert_eq!(registry.record("7.7.7.7").unwrap().suspicious_count(), 0);

        registry.analyze(&request("7.7.7.7", "/documents", ""));
        assert_eq!(registry.record("7.7.7.7").unwrap().suspicious_count(), 1);
    }

    #[test]
    fn test_sweep_resets_idle_identities() {
        let (registry, _sink, clock) = registry();
        for _ in 0..6 {
            registry.analyze(&request("8.8.8.8", "/wp-admin", ""));
        }
        registry.analyze(&request("4.4.4.4", "/", ""));
        assert_eq!(registry.record("8.8.8.8").unwrap().level(), ThreatLevel::Medium);

        clock.advance(DEFAULT_IDLE_TTL);
        registry.analyze(&request("4.4.4.4", "/", ""));
        assert_eq!(registry.sweep(), 0);

        clock.advance(Duration::from_secs(1));
        assert_eq!(registry.sweep(), 1);
        assert!(registry.record("8.8.8.8").is_none());

        registry.analyze(&request("8.8.8.8", "/", ""));
        let record = registry.record("8.8.8.8").unwrap();
        assert_eq!(record.level(), ThreatLevel::Low);
        assert_eq!(record.request_count(), 1);
    }

    #[test]
    fn test_stats_by_level() {
        let (registry, _sink, _clock) = registry();
        for _ in 0..10 {
            registry.analyze(&request("10.0.0.1", "/.git/config", ""));
        }
        for _ in 0..5 {
            registry.analyze(&request("10.0.0.2", "/backup", ""));
        }
        registry.analyze(&request("10.0.0.3", "/", ""));

        assert_eq!(
            registry.stats(),
            ThreatStats {
                total_suspicious_identities: 3,
                high_threats: 1,
                medium_threats: 1,
                low_threats: 1,
                blocked_identities: 1,
            }
        );
    }
}
