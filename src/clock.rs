use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Timestamp source for captured records.
///
/// Records carry wall-clock time in microseconds since the UNIX epoch. The
/// stream reads the clock while holding its lock, so timestamps of
/// consecutive records follow stream order whenever the clock is monotonic.
pub trait Clock: Send + Sync {
    fn now_micros(&self) -> u64;
}

/// Wall-clock time from [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline(always)]
    fn now_micros(&self) -> u64 {
        get_timestamp()
    }
}

/// A clock that only moves when told to.
///
/// # Examples
///
/// ```
/// # use replay_logger::clock::{Clock, ManualClock};
/// # use std::time::Duration;
/// let clock = ManualClock::new(1_000);
/// clock.advance(Duration::from_micros(250));
/// assert_eq!(clock.now_micros(), 1_250);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub const fn new(start_micros: u64) -> Self {
        Self {
            now: AtomicU64::new(start_micros),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, micros: u64) {
        self.now.store(micros, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Microseconds since the UNIX epoch, or 0 if the system clock is set
/// before it.
#[inline(always)]
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u64)
        .unwrap_or(0)
}

/// Renders a timestamp as `seconds.micros`.
pub fn format_timestamp(micros: u64) -> String {
    let ts = Duration::from_micros(micros);
    format!("{}.{:06}", ts.as_secs(), ts.subsec_micros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1_700_000_000_000_123), "1700000000.000123");
        assert_eq!(format_timestamp(0), "0.000000");
    }
}
