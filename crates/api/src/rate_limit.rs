use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Sliding-window request counter keyed by client address.
#[derive(Debug, Clone)]
pub struct IpRateLimiter {
    inner: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    window: Duration,
    max_requests: usize,
}

impl IpRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            window,
            max_requests: max_requests.max(1),
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).is_ok()
    }

    /// Records a hit, or returns how long until the oldest hit leaves the window.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut guard = self.inner.lock();
        // drop idle clients so the map does not grow without bound
        guard.retain(|_, hits| {
            hits.back()
                .is_some_and(|last| now.saturating_duration_since(*last) <= self.window)
        });

        let hits = guard.entry(key.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|front| now.saturating_duration_since(*front) > self.window)
        {
            hits.pop_front();
        }

        if let Some(oldest) = hits.front().filter(|_| hits.len() >= self.max_requests) {
            let waited = now.saturating_duration_since(*oldest);
            return Err(self.window.saturating_sub(waited));
        }

        hits.push_back(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_per_key_within_window() {
        let limiter = IpRateLimiter::new(Duration::from_secs(60), 2);
        let start = Instant::now();

        assert!(limiter.check_at("1.2.3.4", start).is_ok());
        assert!(limiter.check_at("1.2.3.4", start).is_ok());
        let retry = limiter
            .check_at("1.2.3.4", start + Duration::from_secs(10))
            .unwrap_err();
        assert_eq!(retry, Duration::from_secs(50));
        assert!(limiter.allow("5.6.7.8"));
    }

    #[test]
    fn window_expiry_frees_capacity() {
        let limiter = IpRateLimiter::new(Duration::from_secs(1), 1);
        let start = Instant::now();

        assert!(limiter.check_at("local", start).is_ok());
        assert!(limiter.check_at("local", start).is_err());
        assert!(limiter
            .check_at("local", start + Duration::from_secs(2))
            .is_ok());
    }
}
