//! Recording mail sender for testing

use super::MailSender;
use crate::error::DeliveryError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One captured `send` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub correlation_id: String,
}

/// Mail sender that records every call instead of sending.
///
/// Clones share the same record, so a test can keep one handle while the
/// worker owns another.
#[derive(Clone, Default)]
pub struct RecordingMailSender {
    calls: Arc<Mutex<Vec<SentMail>>>,
    failure_message: Option<String>,
}

impl RecordingMailSender {
    /// Create a sender that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sender that records the call and then fails it
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            calls: Arc::default(),
            failure_message: Some(message.into()),
        }
    }

    /// Every call so far, in order
    pub async fn calls(&self) -> Vec<SentMail> {
        self.calls.lock().await.clone()
    }

    /// Number of calls so far
    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Check if a message was sent to a specific address
    pub async fn was_sent_to(&self, to: &str) -> bool {
        self.calls.lock().await.iter().any(|m| m.to == to)
    }
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        correlation_id: &str,
    ) -> Result<(), DeliveryError> {
        self.calls.lock().await.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            correlation_id: correlation_id.to_string(),
        });

        match &self.failure_message {
            Some(message) => Err(DeliveryError::Rejected(message.clone())),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
