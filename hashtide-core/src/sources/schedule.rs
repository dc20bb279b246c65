use std::time::{Duration, Instant};

use tracing::warn;

use crate::{shutdown::ShutdownSignal, types::TickId};

/// What to do when processing a tick takes longer than the tick interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlowBatchPolicy {
    /// Fire the overdue tick as soon as the previous one is done and restart the schedule
    /// from there
    #[default]
    Queue,
    /// Drop the ticks which were missed and fire on the next boundary of the initial
    /// schedule. Events are not dropped, they end up in the next batch.
    Skip,
}

/// Longest supported tick interval
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Fixed wall-clock tick schedule
#[derive(Debug)]
pub struct TickSchedule {
    interval: Duration,
    policy: SlowBatchPolicy,
    next_deadline: Instant,
    next_tick: TickId,
    skipped: u64,
}

impl TickSchedule {
    /// Create a schedule whose first tick fires one interval from now.
    /// The interval is clamped to the range from one millisecond to [MAX_INTERVAL].
    pub fn new(interval: Duration, policy: SlowBatchPolicy) -> Self {
        let interval = interval.clamp(Duration::from_millis(1), MAX_INTERVAL);
        Self {
            interval,
            policy,
            next_deadline: later(Instant::now(), interval),
            next_tick: 0,
            skipped: 0,
        }
    }

    /// Time between two ticks
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Total number of ticks dropped by [SlowBatchPolicy::Skip]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Block until the next tick is due. Returns `None` if shutdown was requested.
    pub fn wait(&mut self, shutdown: &ShutdownSignal) -> Option<TickId> {
        loop {
            let now = Instant::now();
            if now < self.next_deadline {
                if shutdown.wait_timeout(self.next_deadline - now) {
                    return None;
                }
            } else if shutdown.is_triggered() {
                return None;
            }

            let deadline = self.next_deadline;
            let fired_at = Instant::now();
            let late = fired_at.saturating_duration_since(deadline);
            if late < self.interval {
                self.next_deadline = later(deadline, self.interval);
                break;
            }
            match self.policy {
                SlowBatchPolicy::Queue => {
                    warn!(
                        "Slow batch: tick {} starts {late:?} late, the schedule is delayed",
                        self.next_tick
                    );
                    self.next_deadline = later(fired_at, self.interval);
                    break;
                }
                SlowBatchPolicy::Skip => {
                    let missed = late.as_nanos() / self.interval.as_nanos();
                    let missed = u64::try_from(missed).unwrap_or(u64::MAX);
                    warn!("Slow batch: skipping {missed} ticks");
                    self.skipped = self.skipped.saturating_add(missed);
                    self.next_deadline = later(deadline, self.intervals(missed.saturating_add(1)));
                }
            }
        }
        let tick = self.next_tick;
        self.next_tick += 1;
        Some(tick)
    }

    fn intervals(&self, n: u64) -> Duration {
        let nanos = self.interval.as_nanos().saturating_mul(u128::from(n));
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// `from + by`, or one [MAX_INTERVAL] after `from` if that is not representable
fn later(from: Instant, by: Duration) -> Instant {
    from.checked_add(by)
        .or_else(|| from.checked_add(MAX_INTERVAL))
        .unwrap_or(from)
}
