//! In-process stream store
//!
//! Keeps streams, consumer groups and their pending entry lists in memory
//! with the same observable rules as Redis Streams: groups start at the tail
//! or the beginning, `>` reads hand out each entry once per group, delivered
//! entries stay pending until acknowledged.

use super::{StartPosition, StreamStore};
use crate::entry::StreamEntry;
use crate::error::StreamError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// Entry ID as (milliseconds, sequence)
type EntryId = (u64, u64);

fn format_id((ms, seq): EntryId) -> String {
    format!("{ms}-{seq}")
}

fn parse_id(id: &str) -> Option<EntryId> {
    let (ms, seq) = id.split_once('-')?;
    Some((ms.parse().ok()?, seq.parse().ok()?))
}

/// Read cursor; a bare millisecond value like `"0"` means `<ms>-0`
fn parse_cursor(id: &str) -> Option<EntryId> {
    parse_id(id).or_else(|| Some((id.parse().ok()?, 0)))
}

#[derive(Debug)]
struct PendingEntry {
    consumer: String,
    delivery_count: u32,
}

#[derive(Debug, Default)]
struct GroupState {
    last_delivered: EntryId,
    pending: BTreeMap<EntryId, PendingEntry>,
}

#[derive(Debug, Default)]
struct StreamState {
    entries: BTreeMap<EntryId, HashMap<String, String>>,
    last_id: EntryId,
    groups: HashMap<String, GroupState>,
}

impl StreamState {
    fn next_id(&mut self) -> EntryId {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let id = if now > self.last_id.0 {
            (now, 0)
        } else {
            (self.last_id.0, self.last_id.1 + 1)
        };
        self.last_id = id;
        id
    }
}

#[derive(Debug, Default)]
struct State {
    streams: HashMap<String, StreamState>,
    closed: bool,
}

impl State {
    fn open(&self) -> Result<(), StreamError> {
        if self.closed {
            Err(StreamError::Closed)
        } else {
            Ok(())
        }
    }

    fn group_mut(&mut self, stream: &str, group: &str) -> Result<(&mut StreamState, EntryId), StreamError> {
        let missing = || StreamError::NoGroup {
            stream: stream.to_string(),
            group: group.to_string(),
        };
        let state = self.streams.get_mut(stream).ok_or_else(missing)?;
        let last = state
            .groups
            .get(group)
            .map(|g| g.last_delivered)
            .ok_or_else(missing)?;
        Ok((state, last))
    }
}

/// [`StreamStore`] held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryStreamStore {
    state: Mutex<State>,
    appended: Notify,
    close_calls: AtomicUsize,
}

impl InMemoryStreamStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// IDs pending in `group`, oldest first
    pub async fn pending_ids(&self, stream: &str, group: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map(|g| g.pending.keys().copied().map(format_id).collect())
            .unwrap_or_default()
    }

    /// How many times `id` has been handed to a consumer of `group`
    pub async fn delivery_count(&self, stream: &str, group: &str, id: &str) -> Option<u32> {
        let key = parse_id(id)?;
        let state = self.state.lock().await;
        state
            .streams
            .get(stream)?
            .groups
            .get(group)?
            .pending
            .get(&key)
            .map(|p| p.delivery_count)
    }

    /// Number of entries stored in `stream`
    pub async fn len(&self, stream: &str) -> usize {
        let state = self.state.lock().await;
        state.streams.get(stream).map(|s| s.entries.len()).unwrap_or(0)
    }

    /// True once [`StreamStore::close`] has been called
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// How many times [`StreamStore::close`] was invoked
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Deliver new entries to `consumer`, if any
    async fn try_read(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<StreamEntry>, StreamError> {
        let mut state = self.state.lock().await;
        state.open()?;
        let (stream_state, last) = state.group_mut(stream, group)?;

        let batch: Vec<(EntryId, HashMap<String, String>)> = stream_state
            .entries
            .range((std::ops::Bound::Excluded(last), std::ops::Bound::Unbounded))
            .take(count)
            .map(|(id, fields)| (*id, fields.clone()))
            .collect();

        if let Some(group_state) = stream_state.groups.get_mut(group) {
            for (id, _) in &batch {
                group_state.last_delivered = *id;
                group_state.pending.insert(
                    *id,
                    PendingEntry {
                        consumer: consumer.to_string(),
                        delivery_count: 1,
                    },
                );
            }
        }

        Ok(batch
            .into_iter()
            .map(|(id, fields)| StreamEntry::new(format_id(id), fields))
            .collect())
    }
}

#[async_trait]
impl StreamStore for InMemoryStreamStore {
    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        start: StartPosition,
    ) -> Result<(), StreamError> {
        let mut state = self.state.lock().await;
        state.open()?;

        let stream_state = state.streams.entry(stream.to_string()).or_default();
        if stream_state.groups.contains_key(group) {
            return Err(StreamError::GroupExists {
                stream: stream.to_string(),
                group: group.to_string(),
            });
        }

        let last_delivered = match start {
            StartPosition::Beginning => (0, 0),
            StartPosition::Tail => stream_state.last_id,
        };
        stream_state.groups.insert(
            group.to_string(),
            GroupState {
                last_delivered,
                pending: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamEntry>, StreamError> {
        let deadline = tokio::time::Instant::now() + block;

        loop {
            // Registered before checking so an append in between still wakes us.
            let appended = self.appended.notified();

            let entries = self.try_read(stream, group, consumer, count).await?;
            if !entries.is_empty() {
                return Ok(entries);
            }

            if tokio::time::timeout_at(deadline, appended).await.is_err() {
                return Ok(vec![]);
            }
        }
    }

    async fn read_own_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        after: &str,
        count: usize,
    ) -> Result<Vec<StreamEntry>, StreamError> {
        let after = parse_cursor(after)
            .ok_or_else(|| StreamError::Internal(format!("invalid stream ID '{after}'")))?;

        let mut state = self.state.lock().await;
        state.open()?;
        let (stream_state, _) = state.group_mut(stream, group)?;

        let StreamState { entries, groups, .. } = stream_state;
        let Some(group_state) = groups.get_mut(group) else {
            return Ok(vec![]);
        };

        let mut result = Vec::new();
        let range = (std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded);
        for (id, pending) in group_state.pending.range_mut(range) {
            if result.len() >= count {
                break;
            }
            if pending.consumer != consumer {
                continue;
            }
            if let Some(fields) = entries.get(id) {
                pending.delivery_count += 1;
                result.push(StreamEntry::new(format_id(*id), fields.clone()));
            }
        }
        Ok(result)
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<u64, StreamError> {
        let mut state = self.state.lock().await;
        state.open()?;
        let (stream_state, _) = state.group_mut(stream, group)?;

        let removed = parse_id(id)
            .and_then(|key| stream_state.groups.get_mut(group)?.pending.remove(&key))
            .is_some();
        Ok(u64::from(removed))
    }

    async fn pending_count(&self, stream: &str, group: &str) -> Result<u64, StreamError> {
        let mut state = self.state.lock().await;
        state.open()?;
        let (stream_state, _) = state.group_mut(stream, group)?;

        Ok(stream_state
            .groups
            .get(group)
            .map(|g| g.pending.len() as u64)
            .unwrap_or(0))
    }

    async fn append(&self, stream: &str, fields: &[(String, String)]) -> Result<String, StreamError> {
        if fields.is_empty() {
            return Err(StreamError::Internal(
                "cannot append an entry without fields".into(),
            ));
        }

        let id = {
            let mut state = self.state.lock().await;
            state.open()?;
            let stream_state = state.streams.entry(stream.to_string()).or_default();
            let id = stream_state.next_id();
            stream_state
                .entries
                .insert(id, fields.iter().cloned().collect());
            id
        };

        self.appended.notify_waiters();
        Ok(format_id(id))
    }

    async fn close(&self) -> Result<(), StreamError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().await.closed = true;
        self.appended.notify_waiters();
        Ok(())
    }
}
