//! Lock-free scan metrics, mirroring `casparian_sentinel`'s `Metrics`
//! singleton: plain atomics, single-writer-many-readers, a `snapshot()` for
//! point-in-time reads and a Prometheus exposition formatter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide metrics instance.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    pub jobs_submitted: AtomicU64,
    pub jobs_completed: AtomicU64,
    pub jobs_failed: AtomicU64,
    pub jobs_cancelled: AtomicU64,
    pub columns_sampled: AtomicU64,
    pub columns_detected_pii: AtomicU64,
    pub qi_groups_formed: AtomicU64,
    pub ner_circuit_trips: AtomicU64,
    pub strategy_errors: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            jobs_submitted: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            jobs_cancelled: AtomicU64::new(0),
            columns_sampled: AtomicU64::new(0),
            columns_detected_pii: AtomicU64::new(0),
            qi_groups_formed: AtomicU64::new(0),
            ner_circuit_trips: AtomicU64::new(0),
            strategy_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc_jobs_submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_jobs_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_jobs_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_jobs_cancelled(&self) {
        self.jobs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_columns_sampled(&self, n: u64) {
        self.columns_sampled.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_columns_detected_pii(&self, n: u64) {
        self.columns_detected_pii.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_qi_groups_formed(&self, n: u64) {
        self.qi_groups_formed.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_strategy_errors(&self) {
        self.strategy_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// The NER circuit breaker is owned by `NerClientFactory`, not this
    /// singleton, since it's process-wide and shared across jobs; callers
    /// sync its running trip total in here after each detection phase
    /// rather than this struct incrementing it directly.
    #[inline]
    pub fn set_ner_circuit_trips(&self, n: u64) {
        self.ner_circuit_trips.store(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_cancelled: self.jobs_cancelled.load(Ordering::Relaxed),
            columns_sampled: self.columns_sampled.load(Ordering::Relaxed),
            columns_detected_pii: self.columns_detected_pii.load(Ordering::Relaxed),
            qi_groups_formed: self.qi_groups_formed.load(Ordering::Relaxed),
            ner_circuit_trips: self.ner_circuit_trips.load(Ordering::Relaxed),
            strategy_errors: self.strategy_errors.load(Ordering::Relaxed),
        }
    }

    /// Format as Prometheus exposition text.
    pub fn prometheus_format(&self) -> String {
        let s = self.snapshot();
        format!(
            "# HELP pii_scan_jobs_submitted_total Total scan jobs submitted\n\
             # TYPE pii_scan_jobs_submitted_total counter\n\
             pii_scan_jobs_submitted_total {}\n\
             # HELP pii_scan_jobs_completed_total Total scan jobs that reached COMPLETED\n\
             # TYPE pii_scan_jobs_completed_total counter\n\
             pii_scan_jobs_completed_total {}\n\
             # HELP pii_scan_jobs_failed_total Total scan jobs that reached FAILED\n\
             # TYPE pii_scan_jobs_failed_total counter\n\
             pii_scan_jobs_failed_total {}\n\
             # HELP pii_scan_jobs_cancelled_total Total scan jobs cancelled by an operator\n\
             # TYPE pii_scan_jobs_cancelled_total counter\n\
             pii_scan_jobs_cancelled_total {}\n\
             # HELP pii_scan_columns_sampled_total Total columns sampled across all scans\n\
             # TYPE pii_scan_columns_sampled_total counter\n\
             pii_scan_columns_sampled_total {}\n\
             # HELP pii_scan_columns_pii_total Total columns flagged as PII\n\
             # TYPE pii_scan_columns_pii_total counter\n\
             pii_scan_columns_pii_total {}\n\
             # HELP pii_scan_qi_groups_total Total quasi-identifier groups formed\n\
             # TYPE pii_scan_qi_groups_total counter\n\
             pii_scan_qi_groups_total {}\n\
             # HELP pii_scan_ner_circuit_trips_total Total times the NER circuit breaker opened\n\
             # TYPE pii_scan_ner_circuit_trips_total counter\n\
             pii_scan_ner_circuit_trips_total {}\n\
             # HELP pii_scan_strategy_errors_total Total detection strategy invocations that errored\n\
             # TYPE pii_scan_strategy_errors_total counter\n\
             pii_scan_strategy_errors_total {}\n",
            s.jobs_submitted,
            s.jobs_completed,
            s.jobs_failed,
            s.jobs_cancelled,
            s.columns_sampled,
            s.columns_detected_pii,
            s.qi_groups_formed,
            s.ner_circuit_trips,
            s.strategy_errors,
        )
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_cancelled: u64,
    pub columns_sampled: u64,
    pub columns_detected_pii: u64,
    pub qi_groups_formed: u64,
    pub ner_circuit_trips: u64,
    pub strategy_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.inc_jobs_submitted();
        metrics.inc_jobs_submitted();
        metrics.inc_jobs_completed();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_submitted, 2);
        assert_eq!(snapshot.jobs_completed, 1);
    }

    #[test]
    fn prometheus_format_includes_counter_values() {
        let metrics = Metrics::new();
        metrics.inc_jobs_completed();
        assert!(metrics.prometheus_format().contains("pii_scan_jobs_completed_total 1"));
    }
}
