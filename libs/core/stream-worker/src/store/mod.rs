//! Stream store abstraction
//!
//! A durable, ordered log with consumer-group semantics. The consumer loop
//! only talks to this trait; [`RedisStreamStore`] is the production backend
//! and [`InMemoryStreamStore`] gives tests the same pending/acknowledged
//! behaviour without a server.

mod memory;
mod redis;

pub use self::memory::InMemoryStreamStore;
pub use self::redis::RedisStreamStore;

use crate::entry::StreamEntry;
use crate::error::StreamError;
use async_trait::async_trait;
use std::time::Duration;

/// Where a newly created consumer group starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Replay every entry already in the stream
    Beginning,
    /// Only entries appended after the group was created
    Tail,
}

impl StartPosition {
    /// Stream ID understood by `XGROUP CREATE`
    pub fn as_id(&self) -> &'static str {
        match self {
            StartPosition::Beginning => "0",
            StartPosition::Tail => "$",
        }
    }
}

/// Consumer-group operations the worker needs from a stream backend.
///
/// Implementations own their connection; [`StreamStore::close`] releases it
/// and every later call fails with [`StreamError::Closed`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Create `group` on `stream`, creating the stream if needed.
    ///
    /// Returns [`StreamError::GroupExists`] when the group is already there;
    /// the existing group's position is left untouched.
    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        start: StartPosition,
    ) -> Result<(), StreamError>;

    /// Deliver up to `count` never-delivered entries to `consumer`, waiting
    /// at most `block` for one to arrive. An empty vec means no data.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamEntry>, StreamError>;

    /// Up to `count` entries already delivered to `consumer` but not yet
    /// acknowledged, with IDs greater than `after` (`"0"` starts from the
    /// oldest). An entry trimmed from the stream comes back with no fields.
    async fn read_own_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        after: &str,
        count: usize,
    ) -> Result<Vec<StreamEntry>, StreamError>;

    /// Acknowledge `id`. Returns how many entries left the pending set,
    /// so acknowledging twice yields 0 the second time.
    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<u64, StreamError>;

    /// Number of pending entries across all consumers of `group`.
    async fn pending_count(&self, stream: &str, group: &str) -> Result<u64, StreamError>;

    /// Append an entry and return its store-assigned ID.
    async fn append(&self, stream: &str, fields: &[(String, String)]) -> Result<String, StreamError>;

    /// Release the underlying connection. Closing twice is a no-op.
    async fn close(&self) -> Result<(), StreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_position_ids() {
        assert_eq!(StartPosition::Beginning.as_id(), "0");
        assert_eq!(StartPosition::Tail.as_id(), "$");
    }
}
