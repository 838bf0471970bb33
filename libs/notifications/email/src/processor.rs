//! EmailProcessor - decodes stream entries and sends them
//!
//! Implements `stream_worker::MessageProcessor`: an entry is decoded into a
//! [`MailJob`] and handed to the [`MailSender`] with the entry id as the
//! correlation id. The send is bounded by a timeout so a hung provider cannot
//! stall the consumer loop forever.

use crate::error::DeliveryError;
use crate::job::MailJob;
use crate::provider::MailSender;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{MessageProcessor, StreamEntry, StreamError};
use tracing::{debug, info};

/// Default upper bound for one provider call
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Email processor that sends decoded jobs through a sender
pub struct EmailProcessor<S: MailSender> {
    sender: Arc<S>,
    send_timeout: Duration,
}

impl<S: MailSender> EmailProcessor<S> {
    /// Create a new EmailProcessor
    pub fn new(sender: S) -> Self {
        Self::with_arc_sender(Arc::new(sender))
    }

    /// Create with a shared sender
    pub fn with_arc_sender(sender: Arc<S>) -> Self {
        Self {
            sender,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Set the send timeout
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Get the underlying sender
    pub fn sender(&self) -> &S {
        &self.sender
    }
}

#[async_trait]
impl<S: MailSender + 'static> MessageProcessor for EmailProcessor<S> {
    async fn process(&self, entry: &StreamEntry) -> Result<(), StreamError> {
        let job = MailJob::decode(&entry.fields)?;

        debug!(
            message_id = %entry.id,
            to = %job.recipient,
            sender = %self.sender.name(),
            "Sending email"
        );

        tokio::time::timeout(
            self.send_timeout,
            self.sender
                .send(&job.recipient, &job.subject, &job.body, &entry.id),
        )
        .await
        .map_err(|_| DeliveryError::Timeout(self.send_timeout))??;

        info!(message_id = %entry.id, to = %job.recipient, "Email sent successfully");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email_processor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockMailSender;
    use std::collections::HashMap;

    fn entry(pairs: &[(&str, &str)]) -> StreamEntry {
        StreamEntry::new(
            "1700000000000-0",
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[tokio::test]
    async fn test_process_sends_with_entry_id() {
        let mut sender = MockMailSender::new();
        sender
            .expect_send()
            .withf(|to, subject, body, correlation_id| {
                to.to_string() == "a@b.com"
                    && subject.to_string() == "Hi"
                    && body.to_string() == "Hello"
                    && correlation_id.to_string() == "1700000000000-0"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        sender.expect_name().return_const("mock");

        let processor = EmailProcessor::new(sender);
        let result = processor
            .process(&entry(&[("to", "a@b.com"), ("subject", "Hi"), ("body", "Hello")]))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_decode_failure_skips_sender() {
        let mut sender = MockMailSender::new();
        sender.expect_send().never();
        sender.expect_name().return_const("mock");

        let processor = EmailProcessor::new(sender);
        let err = processor
            .process(&entry(&[("to", "a@b.com"), ("body", "Hello")]))
            .await
            .unwrap_err();

        assert!(matches!(err, StreamError::Decode(ref m) if m.contains("subject")));
    }

    #[tokio::test]
    async fn test_send_failure_is_delivery_error() {
        let mut sender = MockMailSender::new();
        sender.expect_send().times(1).returning(|_, _, _, _| {
            Err(DeliveryError::Status {
                status: 500,
                body: "boom".into(),
            })
        });
        sender.expect_name().return_const("mock");

        let processor = EmailProcessor::new(sender);
        let err = processor
            .process(&entry(&[("to", "a@b.com"), ("subject", "Hi"), ("body", "Hello")]))
            .await
            .unwrap_err();

        assert!(matches!(err, StreamError::Delivery(_)));
    }

    struct HangingSender;

    #[async_trait]
    impl MailSender for HangingSender {
        async fn send(&self, _: &str, _: &str, _: &str, _: &str) -> Result<(), DeliveryError> {
            std::future::pending().await
        }

        fn name(&self) -> &'static str {
            "hanging"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_send_times_out() {
        let processor =
            EmailProcessor::new(HangingSender).with_send_timeout(Duration::from_secs(5));

        let err = processor
            .process(&entry(&[("to", "a@b.com"), ("subject", "Hi"), ("body", "Hello")]))
            .await
            .unwrap_err();

        assert!(matches!(err, StreamError::Delivery(ref m) if m.contains("timed out")));
    }

    #[test]
    fn test_processor_name() {
        let processor = EmailProcessor::new(crate::provider::RecordingMailSender::new());
        assert_eq!(processor.name(), "email_processor");
    }
}
