//! Worker configuration
//!
//! This module provides `WorkerConfig` for configuring the stream worker.
//! Stream, group, and consumer names are plain fields so several independently
//! configured workers can live in one process (and tests can use isolated
//! stream names).

use crate::error::StreamError;
use std::time::Duration;

/// Default stream name for outbound email jobs
pub const DEFAULT_STREAM: &str = "go-email:microservice";
/// Default consumer group
pub const DEFAULT_GROUP: &str = "go-email:group";
/// Default consumer name
pub const DEFAULT_CONSUMER: &str = "go-email:consumer";
/// Default wait of one blocking read
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for the stream worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Stream name
    pub stream_name: String,

    /// Consumer group name
    pub consumer_group: String,

    /// Consumer name within the group; stable across restarts so this
    /// consumer's pending entries stay addressable
    pub consumer_name: String,

    /// Maximum entries returned by one read
    pub batch_size: usize,

    /// How long one read may block waiting for new entries
    pub block_timeout: Duration,

    /// First delay after a failed read
    pub read_backoff_initial: Duration,

    /// Upper bound for the read backoff
    pub read_backoff_max: Duration,

    /// Replay this consumer's own pending entries once after startup
    pub recover_pending_on_start: bool,
}

impl WorkerConfig {
    /// Create a new WorkerConfig with explicit names and default tuning
    pub fn new(
        stream_name: impl Into<String>,
        consumer_group: impl Into<String>,
        consumer_name: impl Into<String>,
    ) -> Self {
        Self {
            stream_name: stream_name.into(),
            consumer_group: consumer_group.into(),
            consumer_name: consumer_name.into(),
            batch_size: 1,
            block_timeout: DEFAULT_BLOCK_TIMEOUT,
            read_backoff_initial: Duration::from_millis(500),
            read_backoff_max: Duration::from_secs(30),
            recover_pending_on_start: false,
        }
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the blocking read timeout
    pub fn with_block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = timeout;
        self
    }

    /// Set the read error backoff bounds
    pub fn with_read_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.read_backoff_initial = initial;
        self.read_backoff_max = max;
        self
    }

    /// Enable or disable startup replay of this consumer's pending entries
    pub fn with_pending_recovery(mut self, enable: bool) -> Self {
        self.recover_pending_on_start = enable;
        self
    }

    /// Reject configurations the loop cannot run with
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.stream_name.is_empty() {
            return Err(StreamError::Config("stream name must not be empty".into()));
        }
        if self.consumer_group.is_empty() {
            return Err(StreamError::Config("consumer group must not be empty".into()));
        }
        if self.consumer_name.is_empty() {
            return Err(StreamError::Config("consumer name must not be empty".into()));
        }
        if self.batch_size == 0 {
            return Err(StreamError::Config("batch size must be at least 1".into()));
        }
        if self.block_timeout.is_zero() {
            // BLOCK 0 means "wait forever" and would make cancellation unresponsive.
            return Err(StreamError::Config("block timeout must be non-zero".into()));
        }
        if self.read_backoff_initial > self.read_backoff_max {
            return Err(StreamError::Config(
                "initial read backoff exceeds the maximum".into(),
            ));
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM, DEFAULT_GROUP, DEFAULT_CONSUMER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();

        assert_eq!(config.stream_name, "go-email:microservice");
        assert_eq!(config.consumer_group, "go-email:group");
        assert_eq!(config.consumer_name, "go-email:consumer");
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.block_timeout, Duration::from_secs(2));
        assert!(!config.recover_pending_on_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = WorkerConfig::new("my:stream", "my:group", "worker-1")
            .with_batch_size(20)
            .with_block_timeout(Duration::from_millis(250))
            .with_pending_recovery(true);

        assert_eq!(config.stream_name, "my:stream");
        assert_eq!(config.consumer_name, "worker-1");
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.block_timeout, Duration::from_millis(250));
        assert!(config.recover_pending_on_start);
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        assert!(WorkerConfig::default().with_batch_size(0).validate().is_err());
        assert!(WorkerConfig::default()
            .with_block_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(WorkerConfig::new("", "g", "c").validate().is_err());
        assert!(WorkerConfig::default()
            .with_read_backoff(Duration::from_secs(10), Duration::from_secs(1))
            .validate()
            .is_err());
    }
}
