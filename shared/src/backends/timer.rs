use std::time::{Duration, Instant};

/// Smallest period a [`PeriodicTimer`] will run with
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A one-shot timer that "rings" once `duration` has elapsed since it was
/// last reset. Time is always passed in, so callers control the clock.
#[derive(Clone, Debug)]
pub struct Timer {
    duration: Duration,
    last: Instant,
}

impl Timer {
    pub fn new(duration: Duration, now: Instant) -> Self {
        Self {
            duration,
            last: now,
        }
    }

    /// Restarts the countdown from `now`
    pub fn reset(&mut self, now: Instant) {
        self.last = now;
    }

    /// Whether `duration` has elapsed since the last reset
    pub fn ringing(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last) >= self.duration
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// A repeating timer whose deadlines stay on a fixed grid.
///
/// The next deadline is computed from the previous *expected* deadline, not
/// from the moment the timer was polled, so scheduling jitter does not
/// accumulate. If the caller falls behind by several periods, the missed
/// firings collapse into a single one.
#[derive(Clone, Debug)]
pub struct PeriodicTimer {
    period: Duration,
    expected: Instant,
}

impl PeriodicTimer {
    /// The first deadline is one `period` after `now`. Periods shorter than
    /// a millisecond are raised to one millisecond.
    pub fn new(period: Duration, now: Instant) -> Self {
        let period = period.max(MIN_PERIOD);
        Self {
            period,
            expected: now + period,
        }
    }

    /// Returns true at most once per call when a deadline has passed, and
    /// advances to the first deadline after `now`
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.expected {
            return false;
        }

        self.expected += self.period;
        if now >= self.expected {
            let behind = now.duration_since(self.expected).as_nanos();
            let skipped = behind / self.period.as_nanos() + 1;
            let skipped = u32::try_from(skipped).unwrap_or(u32::MAX);
            self.expected += self.period.saturating_mul(skipped);
        }

        true
    }

    pub fn next_deadline(&self) -> Instant {
        self.expected
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
