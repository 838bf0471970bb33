//! Stream Worker Framework
//!
//! A Redis Streams consumer-group worker with at-least-once delivery.
//!
//! ## Features
//!
//! - **Consumer loop**: blocking batch reads, sequential dispatch, ack only on success
//! - **Lifecycle**: `start` bootstraps the group, `stop` drains and closes the store once
//! - **Pluggable store**: Redis Streams in production, in-memory for tests
//! - **Read backoff**: capped exponential backoff on store errors
//! - **Prometheus metrics** and **health endpoints**
//!
//! ## Example
//!
//! ```ignore
//! use stream_worker::{RedisStreamStore, Worker, WorkerConfig};
//!
//! let config = WorkerConfig::default();
//! let store = Arc::new(RedisStreamStore::connect("redis://127.0.0.1:6379", config.block_timeout).await?);
//!
//! let worker = Worker::new(store, processor, config);
//! worker.start().await?;
//! // ... wait for a shutdown signal ...
//! worker.stop().await?;
//! ```

mod backoff;
mod config;
mod consumer;
mod entry;
mod error;
mod health;
pub mod metrics;
mod processor;
mod store;
mod worker;

// Re-export main types
pub use backoff::Backoff;
pub use config::{
    DEFAULT_BLOCK_TIMEOUT, DEFAULT_CONSUMER, DEFAULT_GROUP, DEFAULT_STREAM, WorkerConfig,
};
pub use consumer::ConsumerLoop;
pub use entry::StreamEntry;
pub use error::StreamError;
pub use health::{HealthResponse, HealthState, health_router};
pub use metrics::{StreamMetrics, init_metrics};
pub use processor::{ChannelProcessor, MessageProcessor};
pub use store::{InMemoryStreamStore, RedisStreamStore, StartPosition, StreamStore};
pub use worker::{Worker, WorkerState};
