// Copyright (c) 2024 Mike Tsao

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// Bounds how many messages go out in any sliding one-second window. Excess
/// messages are refused, not queued; callers drop them.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    sent: VecDeque<Instant>,
}
impl RateLimiter {
    #[allow(missing_docs)]
    pub const WINDOW: Duration = Duration::from_secs(1);

    /// Allows `max_per_second` messages per second.
    pub fn new(max_per_second: usize) -> Self {
        Self {
            max_per_window: max_per_second,
            window: Self::WINDOW,
            sent: VecDeque::with_capacity(max_per_second),
        }
    }

    /// Returns true, and counts the message, if one more may be sent at
    /// `now`.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        while let Some(oldest) = self.sent.front() {
            if now.saturating_duration_since(*oldest) > self.window {
                self.sent.pop_front();
            } else {
                break;
            }
        }
        if self.sent.len() >= self.max_per_window {
            return false;
        }
        self.sent.push_back(now);
        true
    }

    #[allow(missing_docs)]
    pub fn max_per_second(&self) -> usize {
        self.max_per_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_excess_within_window() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(3);
        assert!(limiter.try_acquire(start));
        assert!(limiter.try_acquire(start + Duration::from_millis(100)));
        assert!(limiter.try_acquire(start + Duration::from_millis(200)));
        assert!(!limiter.try_acquire(start + Duration::from_millis(300)));
        assert!(!limiter.try_acquire(start + Duration::from_millis(1000)));

        // The first send has aged out of the window.
        assert!(limiter.try_acquire(start + Duration::from_millis(1001)));
        assert!(!limiter.try_acquire(start + Duration::from_millis(1002)));

        // Everything has aged out.
        let later = start + Duration::from_secs(5);
        assert!((0..3).all(|_| limiter.try_acquire(later)));
        assert!(!limiter.try_acquire(later));
    }

    #[test]
    fn zero_limit_sends_nothing() {
        let mut limiter = RateLimiter::new(0);
        assert!(!limiter.try_acquire(Instant::now()));
    }
}
