use std::time::{Duration, Instant};

/// Decides after each tick whether a checkpoint should be taken
pub trait CheckpointTrigger: Send + 'static {
    /// Return true to checkpoint after the current tick
    fn should_trigger(&mut self) -> bool;
}
impl<F> CheckpointTrigger for F
where
    F: FnMut() -> bool + Send + 'static,
{
    fn should_trigger(&mut self) -> bool {
        self()
    }
}

/// A simple trigger which fires at constant interval based on system time
pub struct IntervalCheckpoints {
    interval: Duration,
    last_trigger: Instant,
}

impl IntervalCheckpoints {
    /// Create a new trigger of the given interval
    pub fn new(interval: Duration) -> Self {
        IntervalCheckpoints {
            interval,
            last_trigger: Instant::now(),
        }
    }
}
impl CheckpointTrigger for IntervalCheckpoints {
    fn should_trigger(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_trigger) >= self.interval {
            self.last_trigger = now;
            true
        } else {
            false
        }
    }
}

/// Fires on every n-th tick
pub struct EveryNTicks {
    n: u64,
    seen: u64,
}

impl EveryNTicks {
    /// Create a trigger firing every `n` ticks. `n` of zero is treated as one.
    pub fn new(n: u64) -> Self {
        Self { n: n.max(1), seen: 0 }
    }
}
impl CheckpointTrigger for EveryNTicks {
    fn should_trigger(&mut self) -> bool {
        self.seen += 1;
        if self.seen >= self.n {
            self.seen = 0;
            true
        } else {
            false
        }
    }
}

/// Never checkpoints during the run. A final checkpoint is still taken on shutdown.
pub struct NoCheckpoints;
impl CheckpointTrigger for NoCheckpoints {
    #[inline(always)]
    fn should_trigger(&mut self) -> bool {
        false
    }
}

/// How often the engine checkpoints, as plain configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckpointCadence {
    /// After every tick
    #[default]
    EveryTick,
    /// After every n-th tick
    EveryNTicks(u64),
    /// After the first tick once the interval has elapsed
    Interval(Duration),
    /// Only on shutdown
    Never,
}

impl CheckpointCadence {
    /// Build the trigger implementing this cadence
    pub fn into_trigger(self) -> Box<dyn CheckpointTrigger> {
        match self {
            CheckpointCadence::EveryTick => Box::new(EveryNTicks::new(1)),
            CheckpointCadence::EveryNTicks(n) => Box::new(EveryNTicks::new(n)),
            CheckpointCadence::Interval(d) => Box::new(IntervalCheckpoints::new(d)),
            CheckpointCadence::Never => Box::new(NoCheckpoints),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_n_ticks() {
        let mut trigger = EveryNTicks::new(3);
        let fired: Vec<bool> = (0..7).map(|_| trigger.should_trigger()).collect();
        assert_eq!(fired, [false, false, true, false, false, true, false]);
    }

    #[test]
    fn zero_is_every_tick() {
        let mut trigger = EveryNTicks::new(0);
        assert!(trigger.should_trigger());
        assert!(trigger.should_trigger());
    }

    #[test]
    fn interval_waits() {
        let mut trigger = IntervalCheckpoints::new(Duration::from_secs(3600));
        assert!(!trigger.should_trigger());
        let mut zero = IntervalCheckpoints::new(Duration::ZERO);
        assert!(zero.should_trigger());
    }

    #[test]
    fn never_and_closures() {
        assert!(!CheckpointCadence::Never.into_trigger().should_trigger());
        let mut count = 0;
        let mut odd = move || {
            count += 1;
            count % 2 == 1
        };
        assert!(CheckpointTrigger::should_trigger(&mut odd));
        assert!(!CheckpointTrigger::should_trigger(&mut odd));
    }
}
