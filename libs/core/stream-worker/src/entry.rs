//! Stream entry envelope
//!
//! The raw field map read from a stream, together with its store-assigned id.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A single entry read from a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Store-assigned entry ID (e.g., "1234567890123-0"). Used for
    /// acknowledgment and passed downstream as the correlation id.
    pub id: String,

    /// Raw payload fields
    pub fields: HashMap<String, String>,
}

impl StreamEntry {
    /// Create a new StreamEntry
    pub fn new(id: impl Into<String>, fields: HashMap<String, String>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build an entry from the ordered pairs a stream read returns.
    /// A repeated key keeps its last value.
    pub fn from_pairs(id: impl Into<String>, pairs: Vec<(String, String)>) -> Self {
        Self::new(id, pairs.into_iter().collect())
    }

    /// Look up a field
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Append time, parsed from the millisecond prefix of the ID.
    ///
    /// Returns `None` for IDs that are not in "ms-seq" form.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.id
            .split('-')
            .next()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
    }

    /// Time since the entry was appended
    pub fn age(&self) -> Option<chrono::Duration> {
        self.timestamp().map(|ts| Utc::now() - ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_from_id() {
        let entry = StreamEntry::new("1700000000000-0", HashMap::new());
        let ts = entry.timestamp().unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
        assert!(entry.age().unwrap() > chrono::Duration::zero());
    }

    #[test]
    fn test_timestamp_invalid_id() {
        let entry = StreamEntry::new("not-an-id", HashMap::new());
        assert!(entry.timestamp().is_none());
        assert!(entry.age().is_none());
    }

    #[test]
    fn test_from_pairs() {
        let entry = StreamEntry::from_pairs(
            "1-0",
            vec![
                ("to".to_string(), "a@b.com".to_string()),
                ("subject".to_string(), "Hi".to_string()),
            ],
        );
        assert_eq!(entry.field("to"), Some("a@b.com"));
        assert_eq!(entry.field("subject"), Some("Hi"));
        assert_eq!(entry.field("body"), None);
    }
}
