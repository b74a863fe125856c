//! Periodic background sweeps.
//!
//! # Responsibilities
//! - Drive `Sweep::sweep` for one store on a fixed period
//! - Stop cleanly on the shutdown broadcast
//! - Keep running when a single pass panics

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::observability::metrics;

/// Longest supported period. Larger values are clamped so deadlines stay
/// representable as `Instant`s.
pub const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A store whose stale state can be reclaimed in one pass.
pub trait Sweep: Send + Sync {
    /// Physically remove stale entries. Returns how many were removed.
    fn sweep(&self) -> usize;

    /// Entries currently held in memory, stale or not.
    fn tracked(&self) -> usize;
}

/// Spawn the sweeper task for `target`.
pub fn spawn_sweeper(
    name: &'static str,
    target: Arc<dyn Sweep>,
    period: Duration,
    shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    spawn_periodic(name, period, shutdown, move || {
        let removed = target.sweep();
        let remaining = target.tracked();
        metrics::record_sweep(name, removed, remaining);
        if removed > 0 {
            tracing::debug!(store = name, removed, remaining, "Sweep reclaimed stale entries");
        }
    })
}

/// Run `task` every `period` until shutdown. The first run happens one full
/// period after spawning.
pub fn spawn_periodic<F>(
    name: &'static str,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
    mut task: F,
) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    let period = period.clamp(Duration::from_millis(1), MAX_PERIOD);

    tokio::spawn(async move {
        let start = time::Instant::now();
        let mut ticker = time::interval_at(start.checked_add(period).unwrap_or(start), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(task = name, period_secs = period.as_secs(), "Periodic task starting");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if panic::catch_unwind(AssertUnwindSafe(&mut task)).is_err() {
                        tracing::error!(task = name, "Periodic task pass panicked, continuing");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(task = name, "Periodic task received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    })
}
