//! Prometheus metrics for stream workers
//!
//! Provides observability into worker throughput and failures.

use crate::error::StreamError;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::info;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize Prometheus metrics
///
/// Call this once at startup. Subsequent calls are no-ops.
pub fn init_metrics() -> Result<(), StreamError> {
    PROMETHEUS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| StreamError::Internal(format!("failed to install Prometheus recorder: {e}")))?;
        info!("Prometheus metrics initialized");
        Ok::<_, StreamError>(handle)
    })?;
    Ok(())
}

/// Get the Prometheus handle for rendering metrics
pub fn metrics_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Per-stream metrics helper
#[derive(Debug, Clone)]
pub struct StreamMetrics {
    stream_name: String,
    processor_name: String,
}

impl StreamMetrics {
    /// Create new StreamMetrics
    pub fn new(stream_name: impl Into<String>, processor_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            processor_name: processor_name.into(),
        }
    }

    /// Record entries returned by a read
    pub fn entries_received(&self, count: usize) {
        counter!(
            "stream_worker_entries_received_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(count as u64);
    }

    /// Record an entry processed and acknowledged
    pub fn entry_processed(&self, duration: Duration) {
        counter!(
            "stream_worker_entries_processed_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone(),
            "status" => "success"
        )
        .increment(1);

        histogram!(
            "stream_worker_entry_duration_seconds",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .record(duration.as_secs_f64());
    }

    /// Record an entry left pending; `kind` is "decode" or "delivery"
    pub fn entry_failed(&self, kind: &'static str) {
        counter!(
            "stream_worker_entries_processed_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone(),
            "status" => "failed"
        )
        .increment(1);

        counter!(
            "stream_worker_entry_errors_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone(),
            "kind" => kind
        )
        .increment(1);
    }

    /// Record an acknowledgment that failed after successful processing
    pub fn ack_failed(&self) {
        counter!(
            "stream_worker_ack_failures_total",
            "stream" => self.stream_name.clone()
        )
        .increment(1);
    }

    /// Record a failed read and the backoff chosen for it
    pub fn read_failed(&self, backoff: Duration) {
        counter!(
            "stream_worker_read_errors_total",
            "stream" => self.stream_name.clone()
        )
        .increment(1);

        gauge!(
            "stream_worker_read_backoff_seconds",
            "stream" => self.stream_name.clone()
        )
        .set(backoff.as_secs_f64());
    }

    /// Clear the backoff gauge after a successful read
    pub fn read_recovered(&self) {
        gauge!(
            "stream_worker_read_backoff_seconds",
            "stream" => self.stream_name.clone()
        )
        .set(0.0);
    }

    /// Record entries replayed from this consumer's pending list
    pub fn entries_recovered(&self, count: usize) {
        counter!(
            "stream_worker_entries_recovered_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(count as u64);
    }
}
