//! Coordinator metrics
//!
//! Prometheus-compatible counters and latency histograms:
//! - Per-operation request counts, failures and latency
//! - Bytes moved through the coordinator
//! - Node failures and reconnect attempts

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Histogram bucket boundaries for latency measurements (in milliseconds)
const LATENCY_BUCKETS: [f64; 11] = [
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0,
];

/// A simple histogram implementation for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new() -> Self {
        Self::with_buckets(&LATENCY_BUCKETS)
    }

    pub fn with_buckets(boundaries: &[f64]) -> Self {
        Self {
            buckets: (0..=boundaries.len()).map(|_| AtomicU64::new(0)).collect(),
            boundaries: boundaries.to_vec(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value in the histogram
    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .boundaries
            .iter()
            .position(|&boundary| value <= boundary)
            .unwrap_or(self.boundaries.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        // Stored in thousandths for precision
        self.sum
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative `(le, count)` pairs, ending with `+Inf`
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        let mut cumulative = 0u64;
        let mut result = Vec::with_capacity(self.boundaries.len() + 1);

        for (i, &boundary) in self.boundaries.iter().enumerate() {
            cumulative += self.buckets[i].load(Ordering::Relaxed);
            result.push((boundary, cumulative));
        }

        cumulative += self.buckets[self.boundaries.len()].load(Ordering::Relaxed);
        result.push((f64::INFINITY, cumulative));

        result
    }

    pub fn sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Metrics for one coordinator operation
#[derive(Debug, Default)]
pub struct OperationMetrics {
    pub requests_total: Counter,
    pub requests_failed: Counter,
    pub latency: Histogram,
}

/// Global metrics registry
#[derive(Debug)]
pub struct MetricsRegistry {
    operations: Mutex<HashMap<&'static str, Arc<OperationMetrics>>>,

    pub bytes_read: Counter,
    pub bytes_written: Counter,
    pub node_failures: Counter,
    pub reconnect_attempts: Counter,
    pub reconnect_successes: Counter,

    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            operations: Mutex::new(HashMap::new()),
            bytes_read: Counter::new(),
            bytes_written: Counter::new(),
            node_failures: Counter::new(),
            reconnect_attempts: Counter::new(),
            reconnect_successes: Counter::new(),
            start_time: Instant::now(),
        }
    }

    /// Get or create metrics for an operation
    pub fn operation(&self, name: &'static str) -> Arc<OperationMetrics> {
        let mut operations = self
            .operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        operations.entry(name).or_default().clone()
    }

    /// Record one completed coordinator operation
    pub fn record_operation(&self, name: &'static str, duration: Duration, success: bool) {
        let op = self.operation(name);
        op.requests_total.inc();
        op.latency.observe(duration.as_secs_f64() * 1000.0);
        if !success {
            op.requests_failed.inc();
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Render Prometheus text exposition
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        let globals = [
            (
                "minifs_bytes_read_total",
                "counter",
                "Bytes downloaded through the coordinator",
                self.bytes_read.get(),
            ),
            (
                "minifs_bytes_written_total",
                "counter",
                "Bytes uploaded through the coordinator",
                self.bytes_written.get(),
            ),
            (
                "minifs_node_failures_total",
                "counter",
                "Node calls that failed in transit",
                self.node_failures.get(),
            ),
            (
                "minifs_reconnect_attempts_total",
                "counter",
                "Attempts to reacquire a dead node",
                self.reconnect_attempts.get(),
            ),
            (
                "minifs_reconnect_successes_total",
                "counter",
                "Dead nodes successfully reacquired",
                self.reconnect_successes.get(),
            ),
            (
                "minifs_uptime_seconds",
                "gauge",
                "Coordinator uptime in seconds",
                self.uptime_seconds(),
            ),
        ];
        for (name, kind, help, value) in globals {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} {}", name, kind);
            let _ = writeln!(out, "{} {}", name, value);
        }

        let mut operations: Vec<(&'static str, Arc<OperationMetrics>)> = self
            .operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(name, metrics)| (*name, metrics.clone()))
            .collect();
        operations.sort_by_key(|(name, _)| *name);

        out.push_str("# HELP minifs_operations_total Coordinator operations served\n");
        out.push_str("# TYPE minifs_operations_total counter\n");
        for (name, metrics) in &operations {
            let _ = writeln!(
                out,
                "minifs_operations_total{{op=\"{}\"}} {}",
                name,
                metrics.requests_total.get()
            );
        }

        out.push_str(
            "# HELP minifs_operations_failed_total Operations with no successful outcome\n",
        );
        out.push_str("# TYPE minifs_operations_failed_total counter\n");
        for (name, metrics) in &operations {
            let _ = writeln!(
                out,
                "minifs_operations_failed_total{{op=\"{}\"}} {}",
                name,
                metrics.requests_failed.get()
            );
        }

        out.push_str("# HELP minifs_operation_duration_ms Operation duration in milliseconds\n");
        out.push_str("# TYPE minifs_operation_duration_ms histogram\n");
        for (name, metrics) in &operations {
            for (le, count) in metrics.latency.get_buckets() {
                let le = if le.is_infinite() {
                    "+Inf".to_string()
                } else {
                    le.to_string()
                };
                let _ = writeln!(
                    out,
                    "minifs_operation_duration_ms_bucket{{op=\"{}\",le=\"{}\"}} {}",
                    name, le, count
                );
            }
            let _ = writeln!(
                out,
                "minifs_operation_duration_ms_sum{{op=\"{}\"}} {}",
                name,
                metrics.latency.sum()
            );
            let _ = writeln!(
                out,
                "minifs_operation_duration_ms_count{{op=\"{}\"}} {}",
                name,
                metrics.latency.count()
            );
        }

        out
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global metrics instance
pub static METRICS: once_cell::sync::Lazy<MetricsRegistry> =
    once_cell::sync::Lazy::new(MetricsRegistry::new);
