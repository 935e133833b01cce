//! Metrics collection for runner monitoring.

use crate::error::{Error, Result};
use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Runner metrics collector
#[derive(Debug)]
pub struct Metrics {
    // Task counters
    tasks_executed: AtomicU64,
    tasks_panicked: AtomicU64,

    // Push paths
    shared_pushes: AtomicU64,
    local_pushes: AtomicU64,

    // Thread-local buffer flushes and the tasks they moved
    flushes: AtomicU64,
    flushed_tasks: AtomicU64,

    // Condvar waits in the run loop
    waits: AtomicU64,

    // execute + cleanup latency
    latency_histogram: RwLock<Histogram<u64>>,

    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self> {
        // 3 significant figures, max one hour in nanoseconds
        let histogram = Histogram::new_with_max(3_600_000_000_000, 3)
            .map_err(|e| Error::telemetry(format!("histogram: {}", e)))?;

        Ok(Self {
            tasks_executed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            shared_pushes: AtomicU64::new(0),
            local_pushes: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            flushed_tasks: AtomicU64::new(0),
            waits: AtomicU64::new(0),
            latency_histogram: RwLock::new(histogram),
            start_time: Instant::now(),
        })
    }

    /// Record a task execution with duration
    pub fn record_task_execution(&self, duration_ns: u64) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);

        if let Some(mut hist) = self.latency_histogram.try_write() {
            let _ = hist.record(duration_ns);
        }
    }

    pub fn record_task_panic(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shared_push(&self) {
        self.shared_pushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_push(&self) {
        self.local_pushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, moved: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flushed_tasks.fetch_add(moved as u64, Ordering::Relaxed);
    }

    pub fn record_wait(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.latency_histogram.read();

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            shared_pushes: self.shared_pushes.load(Ordering::Relaxed),
            local_pushes: self.local_pushes.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flushed_tasks: self.flushed_tasks.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            latency_samples: histogram.len(),
            avg_latency_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p50_latency_ns: histogram.value_at_quantile(0.50),
            p99_latency_ns: histogram.value_at_quantile(0.99),
            max_latency_ns: histogram.max(),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.tasks_executed.store(0, Ordering::Relaxed);
        self.tasks_panicked.store(0, Ordering::Relaxed);
        self.shared_pushes.store(0, Ordering::Relaxed);
        self.local_pushes.store(0, Ordering::Relaxed);
        self.flushes.store(0, Ordering::Relaxed);
        self.flushed_tasks.store(0, Ordering::Relaxed);
        self.waits.store(0, Ordering::Relaxed);

        self.latency_histogram.write().reset();
    }
}

/// Point-in-time copy of a runner's metrics
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub tasks_executed: u64,
    pub tasks_panicked: u64,
    pub shared_pushes: u64,
    pub local_pushes: u64,
    pub flushes: u64,
    pub flushed_tasks: u64,
    pub waits: u64,
    /// Tasks recorded in the latency histogram.
    pub latency_samples: u64,
    pub avg_latency_ns: u64,
    pub p50_latency_ns: u64,
    pub p99_latency_ns: u64,
    pub max_latency_ns: u64,
}

impl MetricsSnapshot {
    /// Share of pushes that skipped the shared lock.
    pub fn local_push_ratio(&self) -> f64 {
        let total = self.shared_pushes + self.local_pushes;
        if total == 0 {
            0.0
        } else {
            self.local_pushes as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let metrics = Metrics::new().unwrap();

        metrics.record_task_execution(1000);
        metrics.record_task_execution(2000);
        metrics.record_task_panic();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_executed, 2);
        assert_eq!(snapshot.latency_samples, 2);
        assert_eq!(snapshot.tasks_panicked, 1);
        assert!(snapshot.avg_latency_ns > 0);
    }

    #[test]
    fn test_push_and_flush_counters() {
        let metrics = Metrics::new().unwrap();

        metrics.record_shared_push();
        metrics.record_local_push();
        metrics.record_local_push();
        metrics.record_local_push();
        metrics.record_flush(3);
        metrics.record_wait();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.flushes, 1);
        assert_eq!(snapshot.flushed_tasks, 3);
        assert_eq!(snapshot.waits, 1);
        assert!((snapshot.local_push_ratio() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = Metrics::new().unwrap();

        metrics.record_task_execution(1000);
        metrics.record_shared_push();
        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_executed, 0);
        assert_eq!(snapshot.shared_pushes, 0);
        assert_eq!(snapshot.max_latency_ns, 0);
    }
}
