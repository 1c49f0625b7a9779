//! Time source for settle delays and poll units.
//!
//! Every wait the session performs goes through a `Clock`, so tests can run
//! the full protocol against a `ManualClock` without sleeping.

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

pub trait Clock: Send + Sync {
    /// Block the caller for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Virtual clock: records requested sleeps and returns immediately.
#[derive(Debug, Default)]
pub struct ManualClock {
    inner: Mutex<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total virtual time slept so far.
    pub fn elapsed(&self) -> Duration {
        self.inner.lock().map(|s| s.elapsed).unwrap_or_default()
    }

    /// Every sleep requested, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner
            .lock()
            .map(|s| s.sleeps.clone())
            .unwrap_or_default()
    }

    pub fn sleep_count(&self) -> usize {
        self.inner.lock().map(|s| s.sleeps.len()).unwrap_or(0)
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut state) = self.inner.lock() {
            state.elapsed += duration;
            state.sleeps.push(duration);
        }
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_records() {
        let clock = Arc::new(ManualClock::new());
        let shared: Arc<ManualClock> = Arc::clone(&clock);
        shared.sleep(Duration::from_millis(500));
        shared.sleep(Duration::from_millis(5000));

        assert_eq!(clock.elapsed(), Duration::from_millis(5500));
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(500), Duration::from_millis(5000)]
        );
    }
}
