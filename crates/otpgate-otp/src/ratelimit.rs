//! Per-number sliding-window rate limiting.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

/// Sliding-window limiter keyed by canonical phone number.
///
/// Each admission records a timestamp; a key is admitted while it has fewer
/// than `max_requests` timestamps inside the window. Expired timestamps are
/// pruned lazily on access, so idle keys cost nothing until touched.
pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    admissions: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` per `window` per key.
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            admissions: Mutex::new(HashMap::new()),
        }
    }

    /// Tries to admit a request for `key` now.
    pub fn admit(&self, key: &str) -> bool {
        self.admit_at(key, Instant::now())
    }

    /// Tries to admit a request for `key` at `now`.
    ///
    /// Returns false without recording anything when the window is full.
    pub fn admit_at(&self, key: &str, now: Instant) -> bool {
        let mut admissions = self.admissions.lock();
        let timestamps = admissions.entry(key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);
        if timestamps.len() >= self.max_requests {
            debug!(%key, "Rate limit window exhausted");
            return false;
        }
        timestamps.push(now);
        true
    }

    /// Forgives the most recent admission for `key`.
    ///
    /// Used to roll an admission back when the admitted work failed, so
    /// the failure does not consume window budget.
    pub fn forgive(&self, key: &str) {
        let mut admissions = self.admissions.lock();
        if let Some(timestamps) = admissions.get_mut(key) {
            timestamps.pop();
            if timestamps.is_empty() {
                admissions.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_secs(60), 5)
    }

    #[test]
    fn test_admits_up_to_limit() {
        let rl = limiter();
        let now = Instant::now();
        for _ in 0..5 {
            assert!(rl.admit_at("263719647303", now));
        }
        assert!(!rl.admit_at("263719647303", now));
    }

    #[test]
    fn test_keys_are_independent() {
        let rl = limiter();
        let now = Instant::now();
        for _ in 0..5 {
            assert!(rl.admit_at("263719647303", now));
        }
        assert!(rl.admit_at("14155550100", now));
    }

    #[test]
    fn test_window_slides() {
        let rl = limiter();
        let start = Instant::now();
        for _ in 0..5 {
            assert!(rl.admit_at("263719647303", start));
        }
        assert!(!rl.admit_at("263719647303", start + Duration::from_secs(30)));
        assert!(rl.admit_at("263719647303", start + Duration::from_secs(61)));
    }

    #[test]
    fn test_forgive_restores_budget() {
        let rl = limiter();
        let now = Instant::now();
        for _ in 0..5 {
            assert!(rl.admit_at("263719647303", now));
        }
        assert!(!rl.admit_at("263719647303", now));
        rl.forgive("263719647303");
        assert!(rl.admit_at("263719647303", now));
    }

    #[test]
    fn test_forgive_unknown_key_is_noop() {
        let rl = limiter();
        rl.forgive("263719647303");
        assert!(rl.admit_at("263719647303", Instant::now()));
    }
}
