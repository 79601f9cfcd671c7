use std::time::Duration;

/// Converts irregular wall-clock elapsed time into whole fixed-size ticks.
///
/// The remainder that does not fill a whole tick is carried into the next
/// call, so the total number of ticks only depends on the summed elapsed
/// time and never on how it was chunked.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    interval: Duration,
    accumulator: Duration,
}

impl FixedTimestep {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            accumulator: Duration::ZERO,
        }
    }

    pub fn from_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }

    /// Adds `elapsed` and returns how many ticks are now due.
    pub fn accumulate(&mut self, elapsed: Duration) -> u32 {
        if self.interval.is_zero() {
            return 0;
        }
        self.accumulator += elapsed;
        let due = self.accumulator.as_nanos() / self.interval.as_nanos();
        let consumed = self.interval.as_nanos() * due;
        self.accumulator = Duration::from_nanos((self.accumulator.as_nanos() - consumed) as u64);
        due.min(u32::MAX as u128) as u32
    }

    /// Time collected towards the next tick.
    pub fn pending(&self) -> Duration {
        self.accumulator
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}
