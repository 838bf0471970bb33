//! Stream error types
//!
//! Only a failed group bootstrap stops the worker. Everything else is logged:
//! the entry stays pending or the read is retried with backoff.

use thiserror::Error;

/// Stream processing errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Consumer group creation hit an existing group
    #[error("Consumer group '{group}' already exists on stream '{stream}'")]
    GroupExists { stream: String, group: String },

    /// Read or ack against a group that does not exist
    #[error("Consumer group '{group}' does not exist on stream '{stream}'")]
    NoGroup { stream: String, group: String },

    /// Consumer group could not be created; the worker must not start
    #[error("Failed to bootstrap consumer group '{group}' on stream '{stream}': {source}")]
    GroupBootstrap {
        stream: String,
        group: String,
        #[source]
        source: Box<StreamError>,
    },

    /// Entry fields could not be decoded into a job
    #[error("Decode error: {0}")]
    Decode(String),

    /// The downstream provider rejected or failed the delivery
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// The store connection was already released
    #[error("Stream store is closed")]
    Closed,

    /// Lifecycle call made in the wrong state
    #[error("Invalid worker state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StreamError {
    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        StreamError::Decode(message.into())
    }

    /// Create a delivery error
    pub fn delivery(message: impl Into<String>) -> Self {
        StreamError::Delivery(message.into())
    }

    /// True for the "group already exists" answer to a create
    pub fn is_group_exists(&self) -> bool {
        match self {
            StreamError::GroupExists { .. } => true,
            StreamError::Redis(e) => e.to_string().contains("BUSYGROUP"),
            _ => false,
        }
    }

    /// True when the consumer group is missing (e.g. the stream key was deleted)
    pub fn is_nogroup(&self) -> bool {
        match self {
            StreamError::NoGroup { .. } => true,
            StreamError::Redis(e) => e.to_string().contains("NOGROUP"),
            _ => false,
        }
    }
}
