//! Telemetry for runners.
//!
//! With the `telemetry` feature every runner keeps a [`Metrics`] collector
//! of push, flush, wait and execution counters plus a latency histogram.
//! Without it a zero-sized stub with the same API is compiled instead.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSnapshot};

// Stub implementations when telemetry is disabled
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    use crate::error::Result;
    use std::time::Duration;

    #[derive(Debug, Clone, Default)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Result<Self> { Ok(Self) }
        pub fn record_task_execution(&self, _: u64) {}
        pub fn record_task_panic(&self) {}
        pub fn record_shared_push(&self) {}
        pub fn record_local_push(&self) {}
        pub fn record_flush(&self, _: usize) {}
        pub fn record_wait(&self) {}
        pub fn snapshot(&self) -> MetricsSnapshot { MetricsSnapshot::default() }
        pub fn reset(&self) {}
    }

    #[derive(Debug, Clone, Default)]
    pub struct MetricsSnapshot {
        pub uptime: Duration,
        pub tasks_executed: u64,
        pub tasks_panicked: u64,
        pub shared_pushes: u64,
        pub local_pushes: u64,
        pub flushes: u64,
        pub flushed_tasks: u64,
        pub waits: u64,
        pub latency_samples: u64,
        pub avg_latency_ns: u64,
        pub p50_latency_ns: u64,
        pub p99_latency_ns: u64,
        pub max_latency_ns: u64,
    }

    impl MetricsSnapshot {
        pub fn local_push_ratio(&self) -> f64 {
            0.0
        }
    }

}

#[cfg(not(feature = "telemetry"))]
pub use metrics::{Metrics, MetricsSnapshot};
