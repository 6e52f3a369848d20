use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::application::ports::{
    Delivery, EventBus, EventBusError, HandlerError, MessageHandler, StreamMessage,
};
use crate::domain::StreamName;

use super::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub group: String,
    pub consumer: String,
    pub batch_size: usize,
    pub block: Duration,
    /// Handlers running at once within one batch.
    pub concurrency: usize,
    pub min_idle: Duration,
    pub claim_interval: Duration,
    /// Deliveries allowed before a failing message is dead-lettered.
    pub max_deliveries: u64,
    pub backoff: RetryPolicy,
}

impl ConsumerConfig {
    pub fn new(group: impl Into<String>, consumer: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            consumer: consumer.into(),
            batch_size: 10,
            block: Duration::from_secs(5),
            concurrency: 4,
            min_idle: Duration::from_secs(60),
            claim_interval: Duration::from_secs(30),
            max_deliveries: 5,
            backoff: RetryPolicy {
                max_retries: u32::MAX,
                base_delay: Duration::from_millis(250),
                max_delay: Duration::from_secs(10),
            },
        }
    }
}

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Acked,
    Discarded,
    /// Left pending for a later claim.
    Pending,
    DeadLettered,
}

/// Drives a [`MessageHandler`] from one stream through a consumer group.
pub struct StreamConsumer {
    bus: Arc<dyn EventBus>,
    stream: StreamName,
    handler: Arc<dyn MessageHandler>,
    config: ConsumerConfig,
}

impl StreamConsumer {
    pub fn new(
        bus: Arc<dyn EventBus>,
        stream: StreamName,
        handler: Arc<dyn MessageHandler>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            bus,
            stream,
            handler,
            config,
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            stream = self.stream.as_str(),
            group = %self.config.group,
            consumer = %self.config.consumer,
            "Stream consumer started"
        );

        let mut failures: u32 = 0;
        while let Err(e) = self.bus.ensure_group(self.stream, &self.config.group).await {
            if !self.back_off(&shutdown, &mut failures, &e).await {
                return;
            }
        }

        // A fresh process first recovers whatever its predecessors left pending.
        let mut last_claim: Option<Instant> = None;
        failures = 0;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if last_claim.is_none_or(|at| at.elapsed() >= self.config.claim_interval) {
                if let Err(e) = self.claim_pass().await {
                    warn!(error = %e, stream = self.stream.as_str(), "Claim pass failed");
                }
                last_claim = Some(Instant::now());
            }

            let read = tokio::select! {
                _ = shutdown.cancelled() => break,
                read = self.read_batch() => read,
            };

            match read {
                Ok(batch) => {
                    failures = 0;
                    self.process_batch(batch).await;
                }
                Err(e) => {
                    if !self.back_off(&shutdown, &mut failures, &e).await {
                        break;
                    }
                }
            }
        }

        info!(stream = self.stream.as_str(), "Stream consumer stopped");
    }

    /// Reads and handles a single batch of new messages.
    pub async fn poll_once(&self) -> Result<Vec<Disposition>, EventBusError> {
        let batch = self.read_batch().await?;
        Ok(self.process_batch(batch).await)
    }

    /// Takes over messages idle for at least `min_idle` and handles them.
    pub async fn claim_pass(&self) -> Result<Vec<Disposition>, EventBusError> {
        let claimed = self
            .bus
            .claim_stale(
                self.stream,
                &self.config.group,
                &self.config.consumer,
                self.config.min_idle,
                self.config.batch_size,
            )
            .await?;
        if !claimed.is_empty() {
            info!(
                stream = self.stream.as_str(),
                count = claimed.len(),
                "Reclaimed stale messages"
            );
        }
        Ok(self.process_batch(claimed).await)
    }

    async fn read_batch(&self) -> Result<Vec<Delivery>, EventBusError> {
        self.bus
            .read_group(
                self.stream,
                &self.config.group,
                &self.config.consumer,
                self.config.batch_size,
                self.config.block,
            )
            .await
    }

    async fn process_batch(&self, batch: Vec<Delivery>) -> Vec<Disposition> {
        if batch.is_empty() {
            return Vec::new();
        }
        let concurrency = self.config.concurrency.max(1);
        futures::stream::iter(batch)
            .map(|delivery| self.dispatch(delivery))
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    async fn dispatch(&self, delivery: Delivery) -> Disposition {
        let span = info_span!(
            "handle_message",
            stream = self.stream.as_str(),
            message_id = %delivery.id,
            event = %delivery.message.event_type().unwrap_or_default(),
            delivery = delivery.delivery_count,
        );

        async {
            match self.handler.handle(&delivery).await {
                Ok(()) => self.ack(&delivery, Disposition::Acked).await,
                Err(HandlerError::Discard(reason)) => {
                    warn!(reason = %reason, "Discarding message");
                    self.ack(&delivery, Disposition::Discarded).await
                }
                Err(HandlerError::Retry(reason))
                    if delivery.delivery_count >= self.config.max_deliveries =>
                {
                    error!(reason = %reason, "Delivery limit reached, dead-lettering");
                    self.dead_letter(&delivery, &reason).await
                }
                Err(HandlerError::Retry(reason)) => {
                    warn!(reason = %reason, "Handler failed, leaving message pending");
                    Disposition::Pending
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn ack(&self, delivery: &Delivery, disposition: Disposition) -> Disposition {
        match self
            .bus
            .ack(self.stream, &self.config.group, &delivery.id)
            .await
        {
            Ok(()) => {
                debug!("Message acknowledged");
                disposition
            }
            Err(e) => {
                warn!(error = %e, "Ack failed, message will be redelivered");
                Disposition::Pending
            }
        }
    }

    async fn dead_letter(&self, delivery: &Delivery, last_error: &str) -> Disposition {
        if let Err(e) = self.handler.on_dead_letter(delivery, last_error).await {
            error!(error = %e, "Dead-letter hook failed, leaving message pending");
            return Disposition::Pending;
        }

        let mut message = StreamMessage::default();
        for (key, value) in delivery.message.fields() {
            message.insert(key.clone(), value.clone());
        }
        message.insert("source_stream", self.stream.as_str());
        message.insert("source_id", delivery.id.as_str());
        message.insert("delivery_count", delivery.delivery_count);
        message.insert("last_error", last_error);

        match self.bus.publish(StreamName::DeadLetter, &message).await {
            Ok(_) => self.ack(delivery, Disposition::DeadLettered).await,
            Err(e) => {
                error!(error = %e, "Dead-letter publish failed, leaving message pending");
                Disposition::Pending
            }
        }
    }

    /// Sleeps after a transport failure. Returns false once shutdown is requested.
    async fn back_off(
        &self,
        shutdown: &CancellationToken,
        failures: &mut u32,
        error: &EventBusError,
    ) -> bool {
        let delay = self.config.backoff.delay_for(*failures);
        *failures = failures.saturating_add(1);
        warn!(
            error = %error,
            stream = self.stream.as_str(),
            delay_ms = delay.as_millis() as u64,
            "Event bus unavailable, backing off"
        );
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
