//! Worker lifecycle
//!
//! `Worker` owns the consumer loop task and the store connection:
//! `Created -> Running -> Stopping -> Stopped`, with no way back. A stopped
//! worker cannot be restarted; build a new one.

use crate::config::WorkerConfig;
use crate::consumer::ConsumerLoop;
use crate::error::StreamError;
use crate::processor::MessageProcessor;
use crate::store::StreamStore;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Lifecycle state of a [`Worker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// Runs a [`ConsumerLoop`] in the background.
///
/// # Example
///
/// ```rust,ignore
/// let store = Arc::new(RedisStreamStore::connect("redis://127.0.0.1:6379", config.block_timeout).await?);
/// let worker = Worker::new(store, processor, WorkerConfig::default());
///
/// worker.start().await?;
/// shutdown_signal().await;
/// worker.stop().await?;
/// ```
pub struct Worker<S: ?Sized, P> {
    consumer: Arc<ConsumerLoop<S, P>>,
    store: Arc<S>,
    shutdown_tx: watch::Sender<bool>,
    state_tx: watch::Sender<WorkerState>,
    /// Held by `start` and `stop` for their whole duration; `Some` while the
    /// loop task has not been joined.
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S, P> Worker<S, P>
where
    S: StreamStore + ?Sized + 'static,
    P: MessageProcessor + 'static,
{
    /// Create a worker in the `Created` state
    pub fn new(store: Arc<S>, processor: P, config: WorkerConfig) -> Self {
        Self::with_arc_processor(store, Arc::new(processor), config)
    }

    /// Create a worker sharing an existing processor
    pub fn with_arc_processor(store: Arc<S>, processor: Arc<P>, config: WorkerConfig) -> Self {
        let consumer = Arc::new(ConsumerLoop::new(store.clone(), processor, config));
        let (shutdown_tx, _) = watch::channel(false);
        let (state_tx, _) = watch::channel(WorkerState::Created);

        Self {
            consumer,
            store,
            shutdown_tx,
            state_tx,
            task: Mutex::new(None),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        *self.state_tx.borrow()
    }

    /// Subscribe to lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state_tx.subscribe()
    }

    /// Get the worker configuration
    pub fn config(&self) -> &WorkerConfig {
        self.consumer.config()
    }

    /// Bootstrap the consumer group and spawn the consumer loop.
    ///
    /// Returns once the loop is running. A group that cannot be created is
    /// fatal: the error is returned, the store is closed and the worker ends
    /// up `Stopped`.
    pub async fn start(&self) -> Result<(), StreamError> {
        let mut task = self.task.lock().await;

        let state = self.state();
        if state != WorkerState::Created {
            return Err(StreamError::InvalidState(format!(
                "cannot start a worker in state {state:?}"
            )));
        }

        if let Err(e) = self.config().validate() {
            self.state_tx.send_replace(WorkerState::Stopped);
            self.release_store().await;
            return Err(e);
        }

        self.state_tx.send_replace(WorkerState::Running);

        if let Err(e) = self.consumer.ensure_group().await {
            error!(error = %e, "Consumer group bootstrap failed");
            self.state_tx.send_replace(WorkerState::Stopped);
            self.release_store().await;
            return Err(e);
        }

        let consumer = self.consumer.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        *task = Some(tokio::spawn(async move { consumer.run(shutdown_rx).await }));

        info!(
            stream = %self.config().stream_name,
            group = %self.config().consumer_group,
            consumer = %self.config().consumer_name,
            "Worker started"
        );
        Ok(())
    }

    /// Signal the loop to stop, wait for it to exit, then close the store.
    ///
    /// Returns within about one block timeout unless an entry is mid-flight,
    /// which is always allowed to finish. Calling `stop` again, concurrently
    /// or later, waits for the first call and returns `Ok` without closing
    /// the store a second time.
    pub async fn stop(&self) -> Result<(), StreamError> {
        let mut task = self.task.lock().await;

        match self.state() {
            WorkerState::Stopped | WorkerState::Stopping => return Ok(()),
            WorkerState::Created => {
                self.state_tx.send_replace(WorkerState::Stopped);
                return self.store.close().await;
            }
            WorkerState::Running => {
                self.state_tx.send_replace(WorkerState::Stopping);
            }
        }

        info!("Stopping worker");
        self.shutdown_tx.send_replace(true);

        if let Some(handle) = task.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Consumer loop task failed");
            }
        }

        let closed = self.store.close().await;
        self.state_tx.send_replace(WorkerState::Stopped);
        info!("Worker stopped");
        closed
    }

    async fn release_store(&self) {
        if let Err(e) = self.store.close().await {
            error!(error = %e, "Failed to close stream store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ChannelProcessor;
    use crate::store::{InMemoryStreamStore, MockStreamStore};
    use std::time::Duration;

    const STREAM: &str = "test:emails";
    const GROUP: &str = "test:group";

    fn config() -> WorkerConfig {
        WorkerConfig::new(STREAM, GROUP, "consumer-1").with_block_timeout(Duration::from_millis(50))
    }

    fn worker(store: Arc<InMemoryStreamStore>) -> Worker<InMemoryStreamStore, ChannelProcessor> {
        let (processor, _rx) = ChannelProcessor::succeeding();
        Worker::new(store, processor, config())
    }

    #[tokio::test]
    async fn test_start_then_stop() {
        let store = Arc::new(InMemoryStreamStore::new());
        let worker = worker(store.clone());
        assert_eq!(worker.state(), WorkerState::Created);

        worker.start().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Running);

        worker.stop().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert_eq!(store.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_stop_twice_closes_once() {
        let store = Arc::new(InMemoryStreamStore::new());
        let worker = worker(store.clone());
        worker.start().await.unwrap();

        worker.stop().await.unwrap();
        worker.stop().await.unwrap();

        assert_eq!(store.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_stop_closes_once() {
        let store = Arc::new(InMemoryStreamStore::new());
        let worker = Arc::new(worker(store.clone()));
        worker.start().await.unwrap();

        let (first, second) = tokio::join!(worker.stop(), worker.stop());
        assert!(first.is_ok());
        assert!(second.is_ok());

        assert_eq!(worker.state(), WorkerState::Stopped);
        assert_eq!(store.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_stop_before_start_releases_store() {
        let store = Arc::new(InMemoryStreamStore::new());
        let worker = worker(store.clone());

        worker.stop().await.unwrap();

        assert_eq!(worker.state(), WorkerState::Stopped);
        assert!(store.is_closed().await);
    }

    #[tokio::test]
    async fn test_cannot_start_twice_or_restart() {
        let store = Arc::new(InMemoryStreamStore::new());
        let worker = worker(store.clone());

        worker.start().await.unwrap();
        assert!(matches!(
            worker.start().await,
            Err(StreamError::InvalidState(_))
        ));

        worker.stop().await.unwrap();
        assert!(matches!(
            worker.start().await,
            Err(StreamError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_failure_is_fatal() {
        let mut store = MockStreamStore::new();
        store
            .expect_create_group()
            .returning(|_, _, _| Err(StreamError::Internal("READONLY replica".into())));
        store.expect_read_group().never();
        store.expect_close().times(1).returning(|| Ok(()));

        let (processor, _rx) = ChannelProcessor::succeeding();
        let worker = Worker::new(Arc::new(store), processor, config());

        let err = worker.start().await.unwrap_err();
        assert!(matches!(err, StreamError::GroupBootstrap { .. }));
        assert_eq!(worker.state(), WorkerState::Stopped);

        // Already released; must not close again.
        worker.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_on_start() {
        let store = Arc::new(InMemoryStreamStore::new());
        let (processor, _rx) = ChannelProcessor::succeeding();
        let worker = Worker::new(store.clone(), processor, config().with_batch_size(0));

        assert!(matches!(worker.start().await, Err(StreamError::Config(_))));
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert_eq!(store.close_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_returns_within_block_timeout() {
        let store = Arc::new(InMemoryStreamStore::new());
        let (processor, _rx) = ChannelProcessor::succeeding();
        let worker = Worker::new(
            store,
            processor,
            config().with_block_timeout(Duration::from_secs(2)),
        );
        worker.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let started = tokio::time::Instant::now();
        worker.stop().await.unwrap();

        assert!(started.elapsed() <= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_state_subscription_sees_transitions() {
        let store = Arc::new(InMemoryStreamStore::new());
        let worker = worker(store);
        let mut states = worker.subscribe_state();

        worker.start().await.unwrap();
        states.changed().await.unwrap();
        assert_eq!(*states.borrow_and_update(), WorkerState::Running);

        worker.stop().await.unwrap();
        assert_eq!(*states.borrow(), WorkerState::Stopped);
    }
}
