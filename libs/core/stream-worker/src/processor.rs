//! Message processor capability
//!
//! The consumer loop hands every entry to a [`MessageProcessor`]. `Ok` means
//! the entry was handled and may be acknowledged; `Err` leaves it pending.

use crate::entry::StreamEntry;
use crate::error::StreamError;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Handles one stream entry at a time.
///
/// # Example
///
/// ```rust,ignore
/// use stream_worker::{MessageProcessor, StreamEntry, StreamError};
///
/// struct Printer;
///
/// #[async_trait]
/// impl MessageProcessor for Printer {
///     async fn process(&self, entry: &StreamEntry) -> Result<(), StreamError> {
///         println!("{}: {:?}", entry.id, entry.fields);
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "printer"
///     }
/// }
/// ```
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Process a single entry.
    async fn process(&self, entry: &StreamEntry) -> Result<(), StreamError>;

    /// Processor name for logging and metrics labels.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<P: MessageProcessor + ?Sized> MessageProcessor for Arc<P> {
    async fn process(&self, entry: &StreamEntry) -> Result<(), StreamError> {
        (**self).process(entry).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Test double that forwards every entry over a channel.
///
/// Outcomes are taken from a queue; once it is empty the default outcome is
/// used. Lets tests observe exactly which entries were dispatched and in what
/// order without a mail provider.
pub struct ChannelProcessor {
    tx: mpsc::UnboundedSender<StreamEntry>,
    outcomes: Mutex<Vec<bool>>,
    succeed_by_default: bool,
}

impl ChannelProcessor {
    /// Processor that accepts every entry
    pub fn succeeding() -> (Self, mpsc::UnboundedReceiver<StreamEntry>) {
        Self::with_default(true)
    }

    /// Processor that rejects every entry
    pub fn failing() -> (Self, mpsc::UnboundedReceiver<StreamEntry>) {
        Self::with_default(false)
    }

    fn with_default(succeed_by_default: bool) -> (Self, mpsc::UnboundedReceiver<StreamEntry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let processor = Self {
            tx,
            outcomes: Mutex::new(Vec::new()),
            succeed_by_default,
        };
        (processor, rx)
    }

    /// Queue explicit outcomes for the next entries, in order
    pub fn with_outcomes(self, outcomes: impl IntoIterator<Item = bool>) -> Self {
        let mut queued: Vec<bool> = outcomes.into_iter().collect();
        queued.reverse();
        Self {
            outcomes: Mutex::new(queued),
            ..self
        }
    }

    fn next_outcome(&self) -> bool {
        self.outcomes
            .lock()
            .ok()
            .and_then(|mut queued| queued.pop())
            .unwrap_or(self.succeed_by_default)
    }
}

#[async_trait]
impl MessageProcessor for ChannelProcessor {
    async fn process(&self, entry: &StreamEntry) -> Result<(), StreamError> {
        // A dropped receiver only means nobody is watching.
        let _ = self.tx.send(entry.clone());

        if self.next_outcome() {
            Ok(())
        } else {
            Err(StreamError::delivery(format!("rejected {}", entry.id)))
        }
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}
