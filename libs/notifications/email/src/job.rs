//! MailJob - the unit of work carried by a stream entry
//!
//! Wire shape: three string fields `to`, `subject` and `body`. Decoding is
//! pure and copies the values exactly as stored.

use crate::error::DecodeError;
use std::collections::HashMap;
use strum::{Display, EnumIter, IntoStaticStr};

/// Keys a mail job entry must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum JobField {
    To,
    Subject,
    Body,
}

impl JobField {
    /// Key as stored in the stream entry
    pub fn key(self) -> &'static str {
        self.into()
    }
}

/// A decoded outbound email.
///
/// The recipient is not validated here; the provider decides what it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailJob {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl MailJob {
    /// Create a new MailJob
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Decode a raw entry field map.
    ///
    /// Extra keys are ignored. An empty value is still a present value.
    pub fn decode(fields: &HashMap<String, String>) -> Result<Self, DecodeError> {
        let get = |field: JobField| {
            fields
                .get(field.key())
                .cloned()
                .ok_or(DecodeError::MissingField(field))
        };

        Ok(Self {
            recipient: get(JobField::To)?,
            subject: get(JobField::Subject)?,
            body: get(JobField::Body)?,
        })
    }

    /// Field/value pairs in wire shape, ready for `StreamStore::append`
    pub fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            (JobField::To.key().to_string(), self.recipient.clone()),
            (JobField::Subject.key().to_string(), self.subject.clone()),
            (JobField::Body.key().to_string(), self.body.clone()),
        ]
    }
}
