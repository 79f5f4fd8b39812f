use std::time::{Duration, Instant};

/// Time source for pacing. Production uses [`SystemClock`]; tests drive a manual clock.
pub trait Clock {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;
    fn sleep(&self, dur: Duration);
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, dur: Duration) {
        if !dur.is_zero() {
            std::thread::sleep(dur);
        }
    }
}

/// Fixed-interval pacing: each paced call is followed by a sleep of
/// `max(interval - elapsed, 0)`, so consecutive call starts are at least `interval` apart
/// however long the calls themselves take.
pub struct Throttle<C: Clock = SystemClock> {
    interval: Duration,
    clock: C,
}

impl Throttle<SystemClock> {
    pub fn new(interval: Duration) -> Self {
        Self::with_clock(interval, SystemClock::new())
    }
}

impl<C: Clock> Throttle<C> {
    pub fn with_clock(interval: Duration, clock: C) -> Self {
        Self { interval, clock }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Runs `call`, then holds the caller until the interval has elapsed since it started.
    pub fn pace<T>(&self, call: impl FnOnce() -> T) -> T {
        let start = self.clock.now();
        let out = call();
        let elapsed = self.clock.now().saturating_sub(start);
        self.clock.sleep(self.interval.saturating_sub(elapsed));
        out
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[derive(Clone, Default)]
    pub(crate) struct ManualClock {
        now: Rc<Cell<Duration>>,
    }

    impl ManualClock {
        pub(crate) fn advance(&self, dur: Duration) {
            self.now.set(self.now.get() + dur);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Duration {
            self.now.get()
        }

        fn sleep(&self, dur: Duration) {
            self.advance(dur);
        }
    }

    #[test]
    fn call_starts_are_never_closer_than_interval() {
        let clock = ManualClock::default();
        let throttle = Throttle::with_clock(Duration::from_secs(2), clock.clone());
        let durations = [
            Duration::from_millis(500),
            Duration::from_secs(3),
            Duration::from_millis(1999),
            Duration::ZERO,
            Duration::from_secs(2),
        ];

        let mut starts: Vec<Duration> = Vec::new();
        for d in durations {
            throttle.pace(|| {
                starts.push(clock.now());
                clock.advance(d);
            });
        }

        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2), "{pair:?}");
        }
        // A slow call is not padded further.
        assert_eq!(starts[2] - starts[1], Duration::from_secs(3));
    }

    #[test]
    fn zero_interval_never_sleeps() {
        let clock = ManualClock::default();
        let throttle = Throttle::with_clock(Duration::ZERO, clock.clone());
        throttle.pace(|| clock.advance(Duration::from_millis(10)));
        assert_eq!(clock.now(), Duration::from_millis(10));
    }
}
