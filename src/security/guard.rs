//! Guard composition: threat analysis, then rate limiting.
//!
//! # Data Flow
//! ```text
//! RequestDescriptor
//!     → ThreatRegistry::analyze   (deny  → Verdict::Denied)
//!     → SlidingWindowLimiter::check (throttle → RATE_LIMIT_EXCEEDED event, Verdict::Throttled)
//!     → Verdict::Pass
//! ```
//!
//! # Design Decisions
//! - Guards never read each other's state
//! - A disabled guard is skipped but its store still exists, so stats stay uniform
//! - Sweep tasks are spawned by the caller, not by construction

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::clock::{self, Clock};
use crate::config::ShieldConfig;
use crate::lifecycle::{spawn_sweeper, Shutdown};
use crate::observability::metrics;
use crate::observability::{EventSink, SecurityEvent};
use crate::security::rate_limit::{Admission, SlidingWindowLimiter};
use crate::security::threat::ThreatRegistry;
use crate::security::RequestDescriptor;

/// Outcome of running every guard over one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Denied,
    Throttled { retry_after: Duration },
}

#[derive(Debug)]
pub struct Guards {
    threats: Arc<ThreatRegistry>,
    limiter: Arc<SlidingWindowLimiter>,
    sink: Arc<dyn EventSink>,
    threats_enabled: bool,
    rate_limit_enabled: bool,
}

impl Guards {
    pub fn from_config(config: &ShieldConfig, sink: Arc<dyn EventSink>) -> Self {
        Self::with_clock(config, sink, clock::system())
    }

    pub fn with_clock(config: &ShieldConfig, sink: Arc<dyn EventSink>, clock: Arc<dyn Clock>) -> Self {
        let threats = ThreatRegistry::new(sink.clone())
            .with_clock(clock.clone())
            .with_idle_ttl(config.threats.idle_ttl());
        let limiter = SlidingWindowLimiter::with_clock(
            config.rate_limit.max_requests,
            config.rate_limit.window(),
            clock,
        );

        Self {
            threats: Arc::new(threats),
            limiter: Arc::new(limiter),
            sink,
            threats_enabled: config.threats.enabled,
            rate_limit_enabled: config.rate_limit.enabled,
        }
    }

    pub fn threats(&self) -> &Arc<ThreatRegistry> {
        &self.threats
    }

    pub fn limiter(&self) -> &Arc<SlidingWindowLimiter> {
        &self.limiter
    }

    /// Run the guards in order and stop at the first refusal.
    pub fn check(&self, request: &RequestDescriptor<'_>) -> Verdict {
        if self.threats_enabled {
            let deny = self.threats.analyze(request);
            metrics::record_guard_decision("threat", !deny);
            if deny {
                tracing::warn!(
                    identity = %request.client_ip,
                    method = %request.method,
                    path = %request.path,
                    "Blocked identity denied"
                );
                return Verdict::Denied;
            }
        }

        if self.rate_limit_enabled {
            match self.limiter.check(request.client_ip) {
                Admission::Allowed { .. } => metrics::record_guard_decision("rate_limit", true),
                Admission::Throttled { retry_after } => {
                    metrics::record_guard_decision("rate_limit", false);
                    self.sink
                        .emit(&SecurityEvent::rate_limit_exceeded(request, self.limiter.limit()));
                    return Verdict::Throttled { retry_after };
                }
            }
        }

        Verdict::Pass
    }

    /// Start the threat and limiter sweepers.
    pub fn spawn_sweepers(&self, config: &ShieldConfig, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        vec![
            spawn_sweeper(
                "threats",
                self.threats.clone(),
                config.threats.sweep_interval(),
                shutdown.subscribe(),
            ),
            spawn_sweeper(
                "rate_limits",
                self.limiter.clone(),
                config.rate_limit.sweep_interval(),
                shutdown.subscribe(),
            ),
        ]
    }
}
