use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamPendingCountReply,
    StreamPendingReply, StreamReadOptions, StreamReadReply,
};
use redis::{AsyncCommands, Client, RedisError};
use tracing::{debug, info, instrument, warn};

use crate::application::ports::{
    Delivery, EventBus, EventBusError, MessageId, PendingSummary, StreamMessage,
};
use crate::domain::StreamName;

/// Redis Streams event bus.
///
/// Blocking reads get their own connection so a long poll never stalls
/// publishes and acks multiplexed on the other one.
pub struct RedisEventBus {
    reader: ConnectionManager,
    writer: ConnectionManager,
    prefix: String,
}

impl RedisEventBus {
    #[instrument(skip(url))]
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, EventBusError> {
        let client = Client::open(url).map_err(|e| EventBusError::Connection(e.to_string()))?;

        let mut retries = 5;
        let mut delay = Duration::from_millis(500);

        loop {
            match Self::open(&client).await {
                Ok((reader, writer)) => {
                    info!("Redis connection established");
                    return Ok(Self {
                        reader,
                        writer,
                        prefix: prefix.to_string(),
                    });
                }
                Err(e) if retries > 0 => {
                    retries -= 1;
                    warn!(
                        error = %e,
                        retries_left = retries,
                        delay_ms = delay.as_millis(),
                        "Redis connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(EventBusError::Connection(e.to_string())),
            }
        }
    }

    async fn open(client: &Client) -> Result<(ConnectionManager, ConnectionManager), RedisError> {
        let reader = ConnectionManager::new(client.clone()).await?;
        let writer = ConnectionManager::new(client.clone()).await?;
        Ok((reader, writer))
    }

    fn key(&self, stream: StreamName) -> String {
        stream.key(&self.prefix)
    }
}

fn command_error(e: RedisError) -> EventBusError {
    if e.is_io_error()
        || e.is_connection_dropped()
        || e.is_connection_refusal()
        || e.is_timeout()
    {
        EventBusError::Connection(e.to_string())
    } else {
        EventBusError::Command(e.to_string())
    }
}

fn decode(entry: StreamId, delivery_count: u64) -> Result<Delivery, EventBusError> {
    let mut pairs = Vec::with_capacity(entry.map.len());
    for (field, value) in &entry.map {
        let value: String = redis::from_redis_value(value)
            .map_err(|e| EventBusError::Decode(format!("{} field {}: {}", entry.id, field, e)))?;
        pairs.push((field.clone(), value));
    }
    Ok(Delivery {
        id: MessageId::new(entry.id),
        message: StreamMessage::from_wire(pairs),
        delivery_count,
    })
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(
        &self,
        stream: StreamName,
        message: &StreamMessage,
    ) -> Result<MessageId, EventBusError> {
        let mut conn = self.writer.clone();
        let id: String = conn
            .xadd(self.key(stream), "*", &message.to_wire())
            .await
            .map_err(command_error)?;
        debug!(stream = stream.as_str(), message_id = %id, "Published");
        Ok(MessageId::new(id))
    }

    async fn ensure_group(&self, stream: StreamName, group: &str) -> Result<(), EventBusError> {
        let mut conn = self.writer.clone();
        let created: Result<(), RedisError> = conn
            .xgroup_create_mkstream(self.key(stream), group, "0")
            .await;
        match created {
            Ok(()) => {
                info!(stream = stream.as_str(), group, "Consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(command_error(e)),
        }
    }

    async fn read_group(
        &self,
        stream: StreamName,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<Delivery>, EventBusError> {
        let mut options = StreamReadOptions::default()
            .group(group, consumer)
            .count(count);
        // BLOCK 0 would wait forever.
        if !block.is_zero() {
            options = options.block(block.as_millis().max(1) as usize);
        }

        let mut conn = self.reader.clone();
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[self.key(stream)], &[">"], &options)
            .await
            .map_err(command_error)?;

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };
        reply
            .keys
            .into_iter()
            .flat_map(|key| key.ids)
            .map(|entry| decode(entry, 1))
            .collect()
    }

    async fn ack(
        &self,
        stream: StreamName,
        group: &str,
        id: &MessageId,
    ) -> Result<(), EventBusError> {
        let mut conn = self.writer.clone();
        let _: i64 = conn
            .xack(self.key(stream), group, &[id.as_str()])
            .await
            .map_err(command_error)?;
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
        let key = self.key(stream);
        let min_idle_ms = min_idle.as_millis() as usize;
        let mut conn = self.writer.clone();

        let mut claimed = Vec::new();
        let mut cursor = "0-0".to_string();
        while claimed.len() < count {
            let reply: StreamAutoClaimReply = conn
                .xautoclaim_options(
                    &key,
                    group,
                    consumer,
                    min_idle_ms,
                    &cursor,
                    StreamAutoClaimOptions::default().count(count - claimed.len()),
                )
                .await
                .map_err(command_error)?;
            if !reply.deleted_ids.is_empty() {
                warn!(
                    stream = stream.as_str(),
                    count = reply.deleted_ids.len(),
                    "Pending entries no longer in stream"
                );
            }
            claimed.extend(reply.claimed);
            if reply.next_stream_id == "0-0" {
                break;
            }
            cursor = reply.next_stream_id;
        }

        let mut deliveries = Vec::with_capacity(claimed.len());
        for entry in claimed {
            // XAUTOCLAIM already counted this delivery.
            let pending: StreamPendingCountReply = conn
                .xpending_count(&key, group, &entry.id, &entry.id, 1)
                .await
                .map_err(command_error)?;
            let times = pending
                .ids
                .first()
                .map_or(1, |p| p.times_delivered as u64);
            deliveries.push(decode(entry, times)?);
        }
        Ok(deliveries)
    }

    async fn pending(
        &self,
        stream: StreamName,
        group: &str,
    ) -> Result<PendingSummary, EventBusError> {
        let mut conn = self.writer.clone();
        let reply: StreamPendingReply = conn
            .xpending(self.key(stream), group)
            .await
            .map_err(command_error)?;

        Ok(match reply {
            StreamPendingReply::Empty => PendingSummary::default(),
            StreamPendingReply::Data(data) => PendingSummary {
                count: data.count as u64,
                oldest_id: Some(MessageId::new(data.start_id)),
                consumers: data
                    .consumers
                    .into_iter()
                    .map(|c| (c.name, c.pending as u64))
                    .collect(),
            },
        })
    }
}
