use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Granularity at which blocking waits check their stop flag.
pub const STOP_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy)]
pub struct TimeBase {
    start: Instant,
}

impl TimeBase {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn epoch(&self) -> Instant {
        self.start
    }

    /// Monotonic microseconds since start.
    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Wall-clock microseconds since Unix epoch (for cross-process logs only).
    pub fn unix_us(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64
    }

    /// First instant on the `period` grid anchored at this base that is not
    /// before `now`.
    pub fn next_boundary(&self, period: Duration, now: Instant) -> Instant {
        let elapsed = now.saturating_duration_since(self.start).as_nanos();
        let period_ns = period.as_nanos().max(1);
        let periods = elapsed.div_ceil(period_ns);
        self.start + Duration::from_nanos((periods * period_ns) as u64)
    }

    /// Index of the `period` grid point nearest to `at`.
    pub fn period_index(&self, period: Duration, at: Instant) -> u64 {
        let elapsed = at.saturating_duration_since(self.start).as_nanos();
        let period_ns = period.as_nanos().max(1);
        ((elapsed + period_ns / 2) / period_ns) as u64
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleeps until `deadline`, waking early when `stop` is raised.
/// Returns `false` if the wait was cut short.
pub fn sleep_until(deadline: Instant, stop: &AtomicBool) -> bool {
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(STOP_POLL));
    }
}

/// Fixed-rate deadline source for periodic tasks.
///
/// Deadlines advance by whole periods, so the cadence self-corrects for the
/// time spent working. A wait that starts up to a quarter period after its
/// deadline returns that deadline at once. Anything later counts as an
/// overrun and moves to the next period boundary instead of bursting.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    next: Instant,
    overruns: u64,
}

impl Ticker {
    /// Ticker whose first deadline is one period from now.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next: Instant::now() + period,
            overruns: 0,
        }
    }

    /// Ticker whose deadlines sit on the `period` grid of `timebase`.
    pub fn aligned(timebase: &TimeBase, period: Duration) -> Self {
        Self {
            period,
            next: timebase.next_boundary(period, Instant::now()),
            overruns: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Blocks until the next deadline and returns it, or `None` if `stop`
    /// was raised while waiting.
    pub fn wait(&mut self, stop: &AtomicBool) -> Option<Instant> {
        let now = Instant::now();
        if now > self.next + self.period / 4 {
            self.overruns += 1;
            let behind = (now - self.next).as_nanos() / self.period.as_nanos().max(1) + 1;
            self.next += self.period * behind as u32;
        }
        let deadline = self.next;
        if !sleep_until(deadline, stop) {
            return None;
        }
        self.next += self.period;
        Some(deadline)
    }
}
