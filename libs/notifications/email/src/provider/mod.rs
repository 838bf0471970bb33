//! Mail sender implementations

pub mod mailtrap;
pub mod mock;

pub use mailtrap::{MailtrapConfig, MailtrapSender};
pub use mock::{RecordingMailSender, SentMail};

use crate::error::DeliveryError;
use async_trait::async_trait;

/// Sends one message through a transactional-email provider.
///
/// Stateless per call. `correlation_id` is the stream entry id and should be
/// forwarded to the provider for tracing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Send a plain-text email
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        correlation_id: &str,
    ) -> Result<(), DeliveryError>;

    /// Get sender name
    fn name(&self) -> &'static str;
}
