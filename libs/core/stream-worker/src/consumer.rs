//! Consumer loop
//!
//! Reads entries addressed to one named consumer, hands each to the processor
//! in store order, and acknowledges only the ones the processor accepted.
//! Rejected entries stay in the group's pending list.

use crate::backoff::Backoff;
use crate::config::WorkerConfig;
use crate::entry::StreamEntry;
use crate::error::StreamError;
use crate::metrics::StreamMetrics;
use crate::processor::MessageProcessor;
use crate::store::{StartPosition, StreamStore};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Page size used when replaying this consumer's pending entries
const RECOVERY_PAGE_SIZE: usize = 100;

/// The read, dispatch, acknowledge cycle for a single consumer
pub struct ConsumerLoop<S: ?Sized, P> {
    store: Arc<S>,
    processor: Arc<P>,
    config: WorkerConfig,
    metrics: StreamMetrics,
}

impl<S, P> ConsumerLoop<S, P>
where
    S: StreamStore + ?Sized,
    P: MessageProcessor,
{
    /// Create a new ConsumerLoop
    pub fn new(store: Arc<S>, processor: Arc<P>, config: WorkerConfig) -> Self {
        let metrics = StreamMetrics::new(&config.stream_name, processor.name());
        Self {
            store,
            processor,
            config,
            metrics,
        }
    }

    /// Get the worker configuration
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Create the consumer group at the stream tail if it does not exist.
    ///
    /// An existing group is left as is. Any other failure is returned as
    /// [`StreamError::GroupBootstrap`].
    pub async fn ensure_group(&self) -> Result<(), StreamError> {
        let stream = &self.config.stream_name;
        let group = &self.config.consumer_group;

        match self
            .store
            .create_group(stream, group, StartPosition::Tail)
            .await
        {
            Ok(()) => {
                info!(stream = %stream, group = %group, "Created consumer group");
                Ok(())
            }
            Err(e) if e.is_group_exists() => {
                debug!(stream = %stream, group = %group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(StreamError::GroupBootstrap {
                stream: stream.clone(),
                group: group.clone(),
                source: Box::new(e),
            }),
        }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Cancellation is checked between reads and while backing off; an entry
    /// already handed to the processor is always finished first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            stream = %self.config.stream_name,
            group = %self.config.consumer_group,
            consumer = %self.config.consumer_name,
            processor = %self.processor.name(),
            batch_size = self.config.batch_size,
            block_timeout_ms = self.config.block_timeout.as_millis() as u64,
            "Starting consumer loop"
        );

        if self.config.recover_pending_on_start {
            self.recover_pending(&shutdown).await;
        }

        let mut backoff = Backoff::new(
            self.config.read_backoff_initial,
            self.config.read_backoff_max,
        );

        loop {
            if is_cancelled(&shutdown) {
                info!("Received shutdown signal, stopping consumer loop");
                break;
            }

            let read = self
                .store
                .read_group(
                    &self.config.stream_name,
                    &self.config.consumer_group,
                    &self.config.consumer_name,
                    self.config.batch_size,
                    self.config.block_timeout,
                )
                .await;

            match read {
                Ok(entries) => {
                    if backoff.failures() > 0 {
                        info!(failures = backoff.failures(), "Stream reads recovered");
                        backoff.reset();
                        self.metrics.read_recovered();
                    }
                    if entries.is_empty() {
                        continue;
                    }
                    self.metrics.entries_received(entries.len());
                    for entry in &entries {
                        self.handle(entry).await;
                    }
                }
                Err(e) => {
                    if e.is_nogroup() {
                        warn!(error = %e, "Consumer group missing, recreating");
                        if let Err(create_err) = self.ensure_group().await {
                            error!(error = %create_err, "Failed to recreate consumer group");
                        }
                    }

                    let delay = backoff.next_delay();
                    self.metrics.read_failed(delay);
                    warn!(
                        error = %e,
                        consecutive_errors = backoff.failures(),
                        backoff_ms = delay.as_millis() as u64,
                        "Stream read failed, backing off"
                    );

                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("Consumer loop stopped");
    }

    /// Process one entry and acknowledge it if the processor accepted it
    async fn handle(&self, entry: &StreamEntry) {
        let started = Instant::now();
        debug!(
            message_id = %entry.id,
            age_ms = ?entry.age().map(|age| age.num_milliseconds()),
            "Processing entry"
        );

        match self.processor.process(entry).await {
            Ok(()) => {
                match self
                    .store
                    .ack(
                        &self.config.stream_name,
                        &self.config.consumer_group,
                        &entry.id,
                    )
                    .await
                {
                    Ok(acked) => {
                        debug!(message_id = %entry.id, acked, "Acknowledged entry");
                    }
                    Err(e) => {
                        // Delivered already; a redelivery after restart is acceptable.
                        self.metrics.ack_failed();
                        warn!(message_id = %entry.id, error = %e, "Failed to acknowledge entry");
                    }
                }
                self.metrics.entry_processed(started.elapsed());
            }
            Err(e) => {
                let kind = match e {
                    StreamError::Decode(_) => "decode",
                    _ => "delivery",
                };
                self.metrics.entry_failed(kind);
                error!(
                    message_id = %entry.id,
                    processor = %self.processor.name(),
                    kind,
                    error = %e,
                    "Failed to process entry, leaving it pending"
                );
            }
        }
    }

    /// Replay entries this consumer received earlier but never acknowledged.
    ///
    /// Runs once, before the first new-entry read, paging through the
    /// consumer's pending list oldest first. A read error ends the replay
    /// early with a warning.
    async fn recover_pending(&self, shutdown: &watch::Receiver<bool>) {
        let page_size = self.config.batch_size.max(RECOVERY_PAGE_SIZE);
        let mut cursor = String::from("0");
        let mut replayed = 0usize;

        loop {
            if is_cancelled(shutdown) {
                info!(replayed, "Shutdown during pending replay");
                return;
            }

            let page = match self
                .store
                .read_own_pending(
                    &self.config.stream_name,
                    &self.config.consumer_group,
                    &self.config.consumer_name,
                    &cursor,
                    page_size,
                )
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, replayed, "Failed to read pending entries, replay incomplete");
                    return;
                }
            };

            let Some(last) = page.last() else {
                break;
            };
            cursor = last.id.clone();

            for entry in &page {
                if entry.fields.is_empty() {
                    // Trimmed from the stream; nothing left to deliver.
                    warn!(message_id = %entry.id, "Pending entry no longer in stream, skipping");
                    continue;
                }
                self.metrics.entries_recovered(1);
                replayed += 1;
                self.handle(entry).await;
            }
        }

        if replayed > 0 {
            info!(replayed, "Replayed pending entries");
        }
    }
}

fn is_cancelled(shutdown: &watch::Receiver<bool>) -> bool {
    // A dropped sender can never signal again, so treat it as cancelled.
    *shutdown.borrow() || shutdown.has_changed().is_err()
}
