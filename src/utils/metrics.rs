//! Observability and Metrics
//!
//! Frame and packet counters for monitoring connection health.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for framing operations
#[derive(Debug)]
pub struct Metrics {
    /// Connections wrapped
    pub connections_opened: AtomicU64,
    /// Connections closed
    pub connections_closed: AtomicU64,
    /// Frames written to the stream
    pub frames_sent: AtomicU64,
    /// Frames read from the stream
    pub frames_received: AtomicU64,
    /// Logical packets written
    pub packets_sent: AtomicU64,
    /// Logical packets reassembled
    pub packets_received: AtomicU64,
    /// Payload bytes written
    pub bytes_sent: AtomicU64,
    /// Payload bytes read
    pub bytes_received: AtomicU64,
    /// Frames rejected for a wrong sequence byte
    pub sequence_mismatches: AtomicU64,
    /// Frames rejected for a bad length or packet size
    pub framing_errors: AtomicU64,
    /// Short reads, short writes and I/O failures
    pub connection_errors: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            sequence_mismatches: AtomicU64::new(0),
            framing_errors: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one frame written with `payload_len` bytes of payload
    pub fn frame_sent(&self, payload_len: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(payload_len, Ordering::Relaxed);
    }

    /// Record one frame read with `payload_len` bytes of payload
    pub fn frame_received(&self, payload_len: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(payload_len, Ordering::Relaxed);
    }

    pub fn packet_sent(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sequence_mismatch(&self) {
        self.sequence_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            sequence_mismatches: self.sequence_mismatches.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_opened = snapshot.connections_opened,
            connections_closed = snapshot.connections_closed,
            frames_sent = snapshot.frames_sent,
            frames_received = snapshot.frames_received,
            packets_sent = snapshot.packets_sent,
            packets_received = snapshot.packets_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            sequence_mismatches = snapshot.sequence_mismatches,
            framing_errors = snapshot.framing_errors,
            connection_errors = snapshot.connection_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Framing metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub sequence_mismatches: u64,
    pub framing_errors: u64,
    pub connection_errors: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<std::sync::Arc<Metrics>> =
    once_cell::sync::Lazy::new(|| std::sync::Arc::new(Metrics::new()));

/// Get the process-wide metrics instance
pub fn global_metrics() -> &'static std::sync::Arc<Metrics> {
    &METRICS
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
