// Conversion metrics
//
// Lightweight counters for a run, logged on exit

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Run-wide conversion metrics
///
/// Uses atomic operations so the batch driver and any observer can share one
/// instance without locks.
#[derive(Debug)]
pub struct Metrics {
    /// Items that produced a package
    pub items_converted: AtomicUsize,

    /// Items that failed
    pub items_failed: AtomicUsize,

    /// Times an item suspended for caller input
    pub items_suspended: AtomicUsize,

    /// Total package bytes produced
    pub bytes_written: AtomicU64,

    /// Time spent converting, in milliseconds
    pub total_conversion_time_ms: AtomicU64,

    /// Usage counter increments that failed
    pub counter_errors: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            items_converted: AtomicUsize::new(0),
            items_failed: AtomicUsize::new(0),
            items_suspended: AtomicUsize::new(0),
            bytes_written: AtomicU64::new(0),
            total_conversion_time_ms: AtomicU64::new(0),
            counter_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a converted item and its package size
    pub fn record_converted(&self, bytes: u64) {
        self.items_converted.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suspended(&self) {
        self.items_suspended.fetch_add(1, Ordering::Relaxed);
    }

    /// Record time spent converting one item
    pub fn record_conversion_time(&self, duration: Duration) {
        self.total_conversion_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_counter_error(&self) {
        self.counter_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average conversion time per finished item in milliseconds
    pub fn avg_conversion_time_ms(&self) -> f64 {
        let total = self.total_conversion_time_ms.load(Ordering::Relaxed);
        let count = self.items_converted.load(Ordering::Relaxed)
            + self.items_failed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Conversion Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Items: {} converted, {} failed, {} suspensions",
            self.items_converted.load(Ordering::Relaxed),
            self.items_failed.load(Ordering::Relaxed),
            self.items_suspended.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Output: {:.2}MB written",
            self.bytes_written.load(Ordering::Relaxed) as f64 / 1024.0 / 1024.0
        );
        tracing::info!(
            "Total conversion time: {:.2}s (avg: {:.2}ms per item)",
            self.total_conversion_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_conversion_time_ms()
        );
        let counter_errors = self.counter_errors.load(Ordering::Relaxed);
        if counter_errors > 0 {
            tracing::info!("Usage counter errors: {}", counter_errors);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
