//! Error types for decoding and delivering mail jobs.

use crate::job::JobField;
use std::time::Duration;
use stream_worker::StreamError;
use thiserror::Error;

/// A stream entry that is not a valid mail job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A required key is absent from the entry
    #[error("missing field '{0}'")]
    MissingField(JobField),
}

/// The mail provider did not accept the message.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The request never got a response (DNS, connect, TLS, ...)
    #[error("request to mail provider failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status
    #[error("mail provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The send did not finish in time
    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    /// The sender is misconfigured (e.g. no API key)
    #[error("mail sender misconfigured: {0}")]
    Config(String),

    /// Rejected by a test or in-process sender
    #[error("rejected: {0}")]
    Rejected(String),
}

impl From<DecodeError> for StreamError {
    fn from(err: DecodeError) -> Self {
        StreamError::decode(err.to_string())
    }
}

impl From<DeliveryError> for StreamError {
    fn from(err: DeliveryError) -> Self {
        StreamError::delivery(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_names_the_field() {
        let err = DecodeError::MissingField(JobField::Subject);
        assert_eq!(err.to_string(), "missing field 'subject'");
    }

    #[test]
    fn test_errors_map_to_stream_errors() {
        let decode: StreamError = DecodeError::MissingField(JobField::To).into();
        assert!(matches!(decode, StreamError::Decode(ref m) if m.contains("'to'")));

        let delivery: StreamError = DeliveryError::Status {
            status: 503,
            body: "unavailable".into(),
        }
        .into();
        assert!(matches!(delivery, StreamError::Delivery(ref m) if m.contains("503")));
    }
}
