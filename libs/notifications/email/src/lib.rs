//! Outbound email jobs for the stream worker
//!
//! ## Components
//!
//! - **Job decoding**: `MailJob::decode` turns a stream entry's `to`/`subject`/`body`
//!   fields into a typed job
//! - **Senders**: `MailSender` trait with a Mailtrap HTTP implementation and a
//!   recording sender for tests
//! - **Processor**: `EmailProcessor` plugs decoding and sending into
//!   `stream_worker::Worker`
//!
//! ## Usage
//!
//! ```ignore
//! use email::{EmailProcessor, MailtrapConfig, MailtrapSender};
//! use stream_worker::{RedisStreamStore, Worker, WorkerConfig};
//!
//! let sender = MailtrapSender::new(MailtrapConfig { api_key, ..Default::default() });
//! let processor = EmailProcessor::new(sender);
//! let worker = Worker::new(store, processor, WorkerConfig::default());
//! worker.start().await?;
//! ```

pub mod error;
pub mod job;
pub mod processor;
pub mod provider;

// Re-export main types
pub use error::{DecodeError, DeliveryError};
pub use job::{JobField, MailJob};
pub use processor::{DEFAULT_SEND_TIMEOUT, EmailProcessor};
pub use provider::{MailSender, MailtrapConfig, MailtrapSender, RecordingMailSender, SentMail};
