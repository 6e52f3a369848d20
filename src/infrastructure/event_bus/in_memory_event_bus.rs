use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::application::ports::{
    Delivery, EventBus, EventBusError, MessageId, PendingSummary, StreamMessage,
};
use crate::domain::StreamName;

struct Entry {
    id: MessageId,
    message: StreamMessage,
}

struct PendingEntry {
    consumer: String,
    delivered_at: Instant,
    delivery_count: u64,
}

#[derive(Default)]
struct Group {
    /// Index of the first entry never handed to this group.
    next: usize,
    pending: BTreeMap<usize, PendingEntry>,
}

#[derive(Default)]
struct Stream {
    entries: Vec<Entry>,
    groups: HashMap<String, Group>,
}

impl Stream {
    fn delivery(&self, index: usize, delivery_count: u64) -> Delivery {
        let entry = &self.entries[index];
        Delivery {
            id: entry.id.clone(),
            message: entry.message.clone(),
            delivery_count,
        }
    }

    /// Ids are `{millis}-{index}`, so the index is read back from the id.
    fn index_of(&self, id: &MessageId) -> Option<usize> {
        let (_, sequence) = id.as_str().rsplit_once('-')?;
        let index = sequence.parse::<usize>().ok()?;
        self.entries
            .get(index)
            .filter(|e| e.id == *id)
            .map(|_| index)
    }
}

/// Single-process event bus with consumer-group semantics: per-group cursor,
/// pending-entry list, acknowledgement and idle reclamation.
///
/// Meant for development and tests. Entries are kept for the life of the
/// process and never trimmed.
#[derive(Default)]
pub struct InMemoryEventBus {
    streams: Mutex<HashMap<StreamName, Stream>>,
    published: Notify,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything ever published to `stream`, oldest first.
    pub async fn messages(&self, stream: StreamName) -> Vec<StreamMessage> {
        let streams = self.streams.lock().await;
        streams
            .get(&stream)
            .map(|s| s.entries.iter().map(|e| e.message.clone()).collect())
            .unwrap_or_default()
    }

    async fn take_new(
        &self,
        stream: StreamName,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<Delivery>, EventBusError> {
        let mut streams = self.streams.lock().await;
        let stream_state = streams
            .get_mut(&stream)
            .ok_or_else(|| no_group(stream, group))?;
        let available = stream_state.entries.len();
        let group_state = stream_state
            .groups
            .get_mut(group)
            .ok_or_else(|| no_group(stream, group))?;

        let start = group_state.next;
        let end = available.min(start + count.max(1));
        let now = Instant::now();
        for index in start..end {
            group_state.pending.insert(
                index,
                PendingEntry {
                    consumer: consumer.to_string(),
                    delivered_at: now,
                    delivery_count: 1,
                },
            );
        }
        group_state.next = end;

        Ok((start..end).map(|i| stream_state.delivery(i, 1)).collect())
    }
}

fn no_group(stream: StreamName, group: &str) -> EventBusError {
    EventBusError::Command(format!("NOGROUP no group {} on stream {}", group, stream))
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(
        &self,
        stream: StreamName,
        message: &StreamMessage,
    ) -> Result<MessageId, EventBusError> {
        let mut streams = self.streams.lock().await;
        let stream_state = streams.entry(stream).or_default();
        let sequence = stream_state.entries.len();
        let id = MessageId::new(format!(
            "{}-{}",
            chrono::Utc::now().timestamp_millis(),
            sequence
        ));
        stream_state.entries.push(Entry {
            id: id.clone(),
            message: StreamMessage::from_wire(message.to_wire()),
        });
        drop(streams);
        self.published.notify_waiters();
        Ok(id)
    }

    async fn ensure_group(&self, stream: StreamName, group: &str) -> Result<(), EventBusError> {
        let mut streams = self.streams.lock().await;
        streams
            .entry(stream)
            .or_default()
            .groups
            .entry(group.to_string())
            .or_default();
        Ok(())
    }

    async fn read_group(
        &self,
        stream: StreamName,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<Delivery>, EventBusError> {
        let deadline = Instant::now() + block;
        loop {
            let notified = self.published.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.take_new(stream, group, consumer, count).await?;
            if !batch.is_empty() || block.is_zero() {
                return Ok(batch);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(
        &self,
        stream: StreamName,
        group: &str,
        id: &MessageId,
    ) -> Result<(), EventBusError> {
        let mut streams = self.streams.lock().await;
        let stream_state = streams
            .get_mut(&stream)
            .ok_or_else(|| no_group(stream, group))?;
        let Some(index) = stream_state.index_of(id) else {
            return Ok(());
        };
        if let Some(group_state) = stream_state.groups.get_mut(group) {
            group_state.pending.remove(&index);
        }
        Ok(())
    }

    async fn claim_stale(
        &self,
        stream: StreamName,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<Delivery>, EventBusError> {
        let mut streams = self.streams.lock().await;
        let stream_state = streams
            .get_mut(&stream)
            .ok_or_else(|| no_group(stream, group))?;
        let group_state = stream_state
            .groups
            .get_mut(group)
            .ok_or_else(|| no_group(stream, group))?;

        let now = Instant::now();
        let mut claimed = Vec::new();
        for (index, pending) in group_state.pending.iter_mut() {
            if claimed.len() >= count {
                break;
            }
            if now.duration_since(pending.delivered_at) >= min_idle {
                pending.consumer = consumer.to_string();
                pending.delivered_at = now;
                pending.delivery_count += 1;
                claimed.push((*index, pending.delivery_count));
            }
        }

        Ok(claimed
            .into_iter()
            .map(|(index, count)| stream_state.delivery(index, count))
            .collect())
    }

    async fn pending(
        &self,
        stream: StreamName,
        group: &str,
    ) -> Result<PendingSummary, EventBusError> {
        let streams = self.streams.lock().await;
        let stream_state = streams
            .get(&stream)
            .ok_or_else(|| no_group(stream, group))?;
        let group_state = stream_state
            .groups
            .get(group)
            .ok_or_else(|| no_group(stream, group))?;

        let mut consumers: BTreeMap<String, u64> = BTreeMap::new();
        for pending in group_state.pending.values() {
            *consumers.entry(pending.consumer.clone()).or_default() += 1;
        }

        Ok(PendingSummary {
            count: group_state.pending.len() as u64,
            oldest_id: group_state
                .pending
                .keys()
                .next()
                .map(|&index| stream_state.entries[index].id.clone()),
            consumers: consumers.into_iter().collect(),
        })
    }
}
