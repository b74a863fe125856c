//! Sliding-window rate limiting per client identity.
//!
//! Each identity owns a log of admission timestamps. A check prunes the log to
//! the trailing window and admits only while the log holds fewer than `limit`
//! entries. Denied attempts are never recorded, so a burst cannot keep a
//! client locked out past the window of its admitted requests.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::clock::{self, Clock};
use crate::lifecycle::sweeper::Sweep;

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Request admitted; `remaining` further requests fit in the current window.
    Allowed { remaining: usize },
    /// Request refused; the oldest admission leaves the window after `retry_after`.
    Throttled { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    /// Identities with at least one admission inside the window.
    pub active_identities: usize,
    /// Admissions inside the window across all identities.
    pub total_requests: usize,
    pub limit: usize,
    pub window_seconds: f64,
}

/// Per-identity sliding-window limiter.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    logs: RwLock<HashMap<String, VecDeque<Instant>>>,
    limit: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    /// Allow `limit` admissions per `window` for every identity.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self::with_clock(limit, window, clock::system())
    }

    pub fn with_clock(limit: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
            limit,
            window,
            clock,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true if `identity` may proceed. Admitted calls are recorded.
    pub fn allow(&self, identity: &str) -> bool {
        self.check(identity).is_allowed()
    }

    /// Admission check with details for the caller (remaining budget or retry delay).
    pub fn check(&self, identity: &str) -> Admission {
        if self.limit == 0 {
            return Admission::Throttled {
                retry_after: self.window,
            };
        }

        let mut logs = self.write();
        // Read the clock under the lock so each log stays in time order.
        let now = self.clock.now();
        let log = logs.entry(identity.to_owned()).or_default();
        prune(log, now, self.window);

        if log.len() >= self.limit {
            let retry_after = log
                .front()
                .map(|&oldest| self.window.saturating_sub(now.saturating_duration_since(oldest)))
                .unwrap_or(self.window);
            return Admission::Throttled { retry_after };
        }

        log.push_back(now);
        Admission::Allowed {
            remaining: self.limit - log.len(),
        }
    }

    pub fn stats(&self) -> RateLimitStats {
        let now = self.clock.now();
        let logs = self.read();

        let mut active_identities = 0;
        let mut total_requests = 0;
        for log in logs.values() {
            let in_window = log
                .iter()
                .filter(|&&ts| now.saturating_duration_since(ts) < self.window)
                .count();
            if in_window > 0 {
                active_identities += 1;
                total_requests += in_window;
            }
        }

        RateLimitStats {
            active_identities,
            total_requests,
            limit: self.limit,
            window_seconds: self.window.as_secs_f64(),
        }
    }

    /// Prune every log and forget identities left empty. Returns identities removed.
    pub fn sweep(&self) -> usize {
        let mut logs = self.write();
        let now = self.clock.now();
        let before = logs.len();
        logs.retain(|_, log| {
            prune(log, now, self.window);
            !log.is_empty()
        });
        before - logs.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.logs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.logs.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drop timestamps that have aged out of the window.
fn prune(log: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = log.front() {
        if now.saturating_duration_since(oldest) < window {
            break;
        }
        log.pop_front();
    }
}

impl Sweep for SlidingWindowLimiter {
    fn sweep(&self) -> usize {
        SlidingWindowLimiter::sweep(self)
    }

    fn tracked(&self) -> usize {
        self.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const IP: &str = "1.2.3.4";

    fn limiter(limit: usize, window_secs: u64) -> (SlidingWindowLimiter, Arc<ManualClock>) {
        let clock = ManualClock::shared();
        let limiter = SlidingWindowLimiter::with_clock(limit, Duration::from_secs(window_secs), clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_three_per_minute_scenario() {
        let (limiter, clock) = limiter(3, 60);

        assert!(limiter.allow(IP));
        assert!(limiter.allow(IP));
        assert!(limiter.allow(IP));

        clock.set(Duration::from_secs(10));
        assert!(!limiter.allow(IP));

        clock.set(Duration::from_secs(61));
        assert!(limiter.allow(IP));
    }

    #[test]
    fn test_first_request_leaves_window_after_exactly_w() {
        let (limiter, clock) = limiter(2, 60);
        assert!(limiter.allow(IP));
        clock.set(Duration::from_secs(30));
        assert!(limiter.allow(IP));

        clock.set(Duration::from_secs(59));
        assert!(!limiter.allow(IP));

        clock.set(Duration::from_secs(60));
        assert!(limiter.allow(IP));
        assert!(!limiter.allow(IP));
    }

    #[test]
    fn test_denied_requests_are_free() {
        let (limiter, clock) = limiter(3, 60);
        for _ in 0..3 {
            assert!(limiter.allow(IP));
        }

        clock.set(Duration::from_millis(59_900));
        for _ in 0..500 {
            assert!(!limiter.allow(IP));
        }
        assert_eq!(limiter.stats().total_requests, 3);

        clock.set(Duration::from_secs(60));
        assert_eq!(limiter.check(IP), Admission::Allowed { remaining: 2 });
    }

    #[test]
    fn test_identities_are_independent() {
        let (limiter, _clock) = limiter(1, 60);
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.2"));
    }

    #[test]
    fn test_retry_after_counts_down_from_oldest() {
        let (limiter, clock) = limiter(2, 60);
        limiter.allow(IP);
        clock.set(Duration::from_secs(20));
        limiter.allow(IP);

        clock.set(Duration::from_secs(45));
        assert_eq!(
            limiter.check(IP),
            Admission::Throttled {
                retry_after: Duration::from_secs(15)
            }
        );
    }

    #[test]
    fn test_zero_limit_denies_everything() {
        let (limiter, _clock) = limiter(0, 60);
        assert!(!limiter.allow(IP));
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_stats_only_count_in_window() {
        let (limiter, clock) = limiter(10, 60);
        limiter.allow("a");
        limiter.allow("a");
        clock.set(Duration::from_secs(40));
        limiter.allow("b");

        let stats = limiter.stats();
        assert_eq!(stats.active_identities, 2);
        assert_eq!(stats.total_requests, 3);

        clock.set(Duration::from_secs(70));
        let stats = limiter.stats();
        assert_eq!(stats.active_identities, 1);
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.limit, 10);
        assert_eq!(stats.window_seconds, 60.0);
    }

    #[test]
    fn test_sweep_forgets_idle_identities() {
        let (limiter, clock) = limiter(5, 60);
        limiter.allow("one-shot");
        clock.set(Duration::from_secs(50));
        limiter.allow("regular");

        clock.set(Duration::from_secs(61));
        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked(), 1);
        assert_eq!(limiter.stats().active_identities, 1);
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_limit() {
        let (limiter, _clock) = limiter(50, 60);
        let limiter = Arc::new(limiter);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..20).filter(|_| limiter.allow(IP)).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(admitted, 50);
    }
}
