//! Shared test utilities for the stream worker crates
//!
//! - `RedisStreamContainer`: disposable Redis with stream and group queries (feature: "redis")
//! - `TestStreamNames`: per-test stream, group and consumer names (always available)
//!
//! # Usage
//!
//! Add `features = ["redis"]` to your dev-dependencies:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["redis"] }
//! ```
//!
//! Then in your tests:
//!
//! ```rust,ignore
//! use test_utils::{RedisStreamContainer, TestStreamNames};
//!
//! #[tokio::test]
//! #[ignore = "requires Docker"]
//! async fn my_redis_test() {
//!     let redis = RedisStreamContainer::start().await;
//!     let names = TestStreamNames::from_test_name("my_redis_test");
//!
//!     let store = RedisStreamStore::connect(redis.url(), Duration::from_secs(2)).await.unwrap();
//!     store.append(&names.stream, &fields).await.unwrap();
//!     assert_eq!(redis.stream_len(&names.stream).await, 1);
//! }
//! ```

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "redis")]
pub use redis::RedisStreamContainer;

/// Stream, group and consumer names unique to one test.
///
/// Derived from the test name so reruns are reproducible while tests that
/// share a Redis instance never see each other's entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestStreamNames {
    pub stream: String,
    pub group: String,
    pub consumer: String,
}

impl TestStreamNames {
    /// Create names from a seed
    pub fn new(seed: u64) -> Self {
        Self {
            stream: format!("test:{seed}:jobs"),
            group: format!("test:{seed}:group"),
            consumer: format!("test-{seed}-consumer"),
        }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestStreamNames;
    ///
    /// let names = TestStreamNames::from_test_name("test_ack_on_success");
    /// assert!(names.stream.starts_with("test:"));
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }
}
