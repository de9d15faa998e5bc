//! Monotonic timers used for every expiry decision in the master.
//!
//! Built on `tokio::time::Instant`, so tests can pause and advance the
//! clock instead of sleeping.

use tokio::time::{Duration, Instant};

/// Remembers when it was last reset.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    last_reset: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            last_reset: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.last_reset = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.last_reset.elapsed()
    }

    /// True once strictly more than `interval` has passed since the last reset.
    pub fn interval_elapsed(&self, interval: Duration) -> bool {
        self.elapsed() > interval
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// A value stamped with its creation time.
#[derive(Debug, Clone)]
pub struct Expirable<T> {
    value: T,
    timer: Timer,
}

impl<T> Expirable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            timer: Timer::new(),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn expired(&self, lifetime: Duration) -> bool {
        self.timer.interval_elapsed(lifetime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_interval_is_strict() {
        let timer = Timer::new();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!timer.interval_elapsed(Duration::from_secs(5)));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(timer.interval_elapsed(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_reset() {
        let mut timer = Timer::new();
        tokio::time::advance(Duration::from_secs(10)).await;
        timer.reset();
        assert!(!timer.interval_elapsed(Duration::from_secs(1)));
        assert_eq!(timer.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expirable_value() {
        let mut value = Expirable::new(7u32);
        *value.value_mut() += 1;
        assert_eq!(*value.value(), 8);
        assert!(!value.expired(Duration::from_secs(15)));

        tokio::time::advance(Duration::from_secs(16)).await;
        assert!(value.expired(Duration::from_secs(15)));
    }
}
