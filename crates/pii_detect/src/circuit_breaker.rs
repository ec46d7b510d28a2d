//! A small circuit breaker guarding calls to the external NER service.
//!
//! Mirrors the lock-free-atomics-for-counters style used for metrics
//! elsewhere in the stack; the one piece that can't be a bare atomic is the
//! "when did we open" timestamp, which lives behind a `Mutex<Instant>` since
//! `Instant` has no atomic representation.

use pii_protocol::CircuitBreakerConfig;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct CircuitBreaker {
    failures: AtomicU32,
    opened_at: Mutex<Option<Instant>>,
    trips: AtomicU64,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            failures: AtomicU32::new(0),
            opened_at: Mutex::new(None),
            trips: AtomicU64::new(0),
            failure_threshold: config.failure_threshold,
            reset_timeout: Duration::from_secs(config.reset_timeout_seconds),
        }
    }

    /// Total number of times this breaker has transitioned from closed to
    /// open over its lifetime. Since the breaker is process-wide (shared
    /// across jobs by the `NerClientFactory` that owns it), this is a
    /// monotonically increasing total, not a per-job count.
    pub fn trip_count(&self) -> u64 {
        self.trips.load(Ordering::Relaxed)
    }

    /// `true` if the breaker is currently open and calls should be skipped.
    /// A breaker past its reset timeout transitions to half-open (calls
    /// allowed again) without an explicit intermediate state; the next
    /// `record_success`/`record_failure` settles it.
    pub fn is_open(&self) -> bool {
        let opened_at = self.opened_at.lock().expect("circuit breaker mutex poisoned");
        match *opened_at {
            Some(at) => at.elapsed() < self.reset_timeout,
            None => false,
        }
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Relaxed);
        *self.opened_at.lock().expect("circuit breaker mutex poisoned") = None;
    }

    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.failure_threshold {
            let mut opened_at = self.opened_at.lock().expect("circuit breaker mutex poisoned");
            if opened_at.is_none() {
                *opened_at = Some(Instant::now());
                self.trips.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: u32, reset_secs: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig { failure_threshold: threshold, reset_timeout_seconds: reset_secs }
    }

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(&config(3, 60));
        assert!(!breaker.is_open());
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());
    }

    #[test]
    fn trip_count_increments_once_per_open_transition() {
        let breaker = CircuitBreaker::new(&config(2, 60));
        assert_eq!(breaker.trip_count(), 0);
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.trip_count(), 1);
        breaker.record_failure();
        assert_eq!(breaker.trip_count(), 1, "already open, should not trip again");
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.trip_count(), 2);
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(&config(2, 60));
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn closes_again_after_reset_timeout_elapses() {
        let breaker = CircuitBreaker::new(&config(1, 0));
        breaker.record_failure();
        assert!(!breaker.is_open());
    }
}
