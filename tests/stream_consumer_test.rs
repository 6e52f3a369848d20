use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use dragoman::application::ports::{
    Delivery, EventBus, HandlerError, MessageHandler, MessageId, StreamMessage,
};
use dragoman::application::services::{ConsumerConfig, Disposition, StreamConsumer};
use dragoman::domain::{EventKind, JobId, StreamName};
use dragoman::infrastructure::event_bus::InMemoryEventBus;

const GROUP: &str = "orchestrator";

/// Records every delivery and answers with a fixed outcome.
struct ScriptedHandler {
    outcome: fn() -> Result<(), HandlerError>,
    seen: Mutex<Vec<Delivery>>,
}

impl ScriptedHandler {
    fn new(outcome: fn() -> Result<(), HandlerError>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn succeeding() -> Arc<Self> {
        Self::new(|| Ok(()))
    }

    fn retrying() -> Arc<Self> {
        Self::new(|| Err(HandlerError::Retry("database unavailable".to_string())))
    }

    fn discarding() -> Arc<Self> {
        Self::new(|| Err(HandlerError::Discard("unknown event".to_string())))
    }

    async fn seen(&self) -> Vec<Delivery> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl MessageHandler for ScriptedHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        self.seen.lock().await.push(delivery.clone());
        (self.outcome)()
    }
}

fn config(consumer: &str) -> ConsumerConfig {
    let mut config = ConsumerConfig::new(GROUP, consumer);
    config.block = Duration::ZERO;
    config.min_idle = Duration::ZERO;
    config
}

fn consumer(
    bus: &Arc<InMemoryEventBus>,
    handler: Arc<ScriptedHandler>,
    config: ConsumerConfig,
) -> StreamConsumer {
    StreamConsumer::new(bus.clone(), StreamName::Events, handler, config)
}

async fn bus_with_message() -> (Arc<InMemoryEventBus>, JobId) {
    let bus = Arc::new(InMemoryEventBus::new());
    bus.ensure_group(StreamName::Events, GROUP).await.unwrap();
    let job_id = JobId::new();
    bus.publish(
        StreamName::Events,
        &StreamMessage::new(EventKind::JobCreated, job_id),
    )
    .await
    .unwrap();
    (bus, job_id)
}

#[tokio::test]
async fn given_successful_handler_when_polling_then_message_is_acknowledged() {
    let (bus, job_id) = bus_with_message().await;
    let handler = ScriptedHandler::succeeding();

    let dispositions = consumer(&bus, handler.clone(), config("a"))
        .poll_once()
        .await
        .unwrap();

    assert_eq!(dispositions, vec![Disposition::Acked]);
    let seen = handler.seen().await;
    assert_eq!(seen[0].delivery_count, 1);
    assert_eq!(
        seen[0].message.get_str("job_id"),
        Some(job_id.to_string())
    );
    assert_eq!(bus.pending(StreamName::Events, GROUP).await.unwrap().count, 0);
}

#[tokio::test]
async fn given_failing_consumer_when_message_goes_idle_then_another_consumer_reclaims_it() {
    let (bus, _) = bus_with_message().await;

    let dispositions = consumer(&bus, ScriptedHandler::retrying(), config("a"))
        .poll_once()
        .await
        .unwrap();
    assert_eq!(dispositions, vec![Disposition::Pending]);

    let pending = bus.pending(StreamName::Events, GROUP).await.unwrap();
    assert_eq!(pending.count, 1);
    assert_eq!(pending.consumers, vec![("a".to_string(), 1)]);

    let rescuer = ScriptedHandler::succeeding();
    let dispositions = consumer(&bus, rescuer.clone(), config("b"))
        .claim_pass()
        .await
        .unwrap();

    assert_eq!(dispositions, vec![Disposition::Acked]);
    assert_eq!(rescuer.seen().await[0].delivery_count, 2);
    assert_eq!(bus.pending(StreamName::Events, GROUP).await.unwrap().count, 0);
}

#[tokio::test]
async fn given_recent_pending_message_when_claiming_then_it_is_left_alone() {
    let (bus, _) = bus_with_message().await;
    consumer(&bus, ScriptedHandler::retrying(), config("a"))
        .poll_once()
        .await
        .unwrap();

    let mut patient = config("b");
    patient.min_idle = Duration::from_secs(60);
    let dispositions = consumer(&bus, ScriptedHandler::succeeding(), patient)
        .claim_pass()
        .await
        .unwrap();

    assert!(dispositions.is_empty());
    assert_eq!(bus.pending(StreamName::Events, GROUP).await.unwrap().count, 1);
}

#[tokio::test]
async fn given_poison_message_when_delivery_limit_is_reached_then_it_is_dead_lettered() {
    let (bus, job_id) = bus_with_message().await;
    let mut limited = config("a");
    limited.max_deliveries = 2;
    let consumer = consumer(&bus, ScriptedHandler::retrying(), limited);

    assert_eq!(consumer.poll_once().await.unwrap(), vec![Disposition::Pending]);
    assert_eq!(
        consumer.claim_pass().await.unwrap(),
        vec![Disposition::DeadLettered]
    );

    let dead = bus.messages(StreamName::DeadLetter).await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].get_str("job_id"), Some(job_id.to_string()));
    assert_eq!(dead[0].get_str("source_stream").as_deref(), Some("events"));
    assert_eq!(dead[0].get_u64("delivery_count"), Some(2));
    assert!(
        dead[0]
            .get_str("last_error")
            .unwrap()
            .contains("database unavailable")
    );
    assert_eq!(bus.pending(StreamName::Events, GROUP).await.unwrap().count, 0);
}

#[tokio::test]
async fn given_discarding_handler_when_polling_then_message_is_acknowledged() {
    let (bus, _) = bus_with_message().await;

    let dispositions = consumer(&bus, ScriptedHandler::discarding(), config("a"))
        .poll_once()
        .await
        .unwrap();

    assert_eq!(dispositions, vec![Disposition::Discarded]);
    assert_eq!(bus.pending(StreamName::Events, GROUP).await.unwrap().count, 0);
}

#[tokio::test]
async fn given_running_consumer_when_message_is_published_then_it_is_handled_until_shutdown() {
    let bus = Arc::new(InMemoryEventBus::new());
    let handler = ScriptedHandler::succeeding();
    let mut live = config("a");
    live.block = Duration::from_millis(50);
    let consumer = consumer(&bus, handler.clone(), live);
    let shutdown = CancellationToken::new();

    let running = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { consumer.run(shutdown).await }
    });

    // The consumer creates its group on start.
    tokio::time::timeout(Duration::from_secs(2), async {
        while bus.pending(StreamName::Events, GROUP).await.is_err() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    bus.publish(
        StreamName::Events,
        &StreamMessage::new(EventKind::JobCreated, JobId::new()),
    )
    .await
    .unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while handler.seen().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(handler.seen().await.len(), 1);
}

#[tokio::test]
async fn given_group_created_after_publish_when_reading_then_earlier_messages_are_delivered() {
    let bus = InMemoryEventBus::new();
    bus.publish(
        StreamName::Events,
        &StreamMessage::new(EventKind::JobCreated, JobId::new()),
    )
    .await
    .unwrap();

    bus.ensure_group(StreamName::Events, GROUP).await.unwrap();
    bus.ensure_group(StreamName::Events, GROUP).await.unwrap();
    let batch = bus
        .read_group(StreamName::Events, GROUP, "a", 10, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(batch.len(), 1);
    assert!(batch[0].message.get_str("timestamp").is_some());
}

#[tokio::test]
async fn given_missing_group_when_reading_then_error_is_returned() {
    let bus = InMemoryEventBus::new();

    let result = bus
        .read_group(StreamName::Events, GROUP, "a", 10, Duration::ZERO)
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn given_blocking_read_when_message_arrives_later_then_read_wakes_up() {
    let bus = Arc::new(InMemoryEventBus::new());
    bus.ensure_group(StreamName::Events, GROUP).await.unwrap();

    let publisher = tokio::spawn({
        let bus = bus.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            bus.publish(
                StreamName::Events,
                &StreamMessage::new(EventKind::JobCreated, JobId::new()),
            )
            .await
            .unwrap();
        }
    });

    let batch = bus
        .read_group(StreamName::Events, GROUP, "a", 10, Duration::from_secs(2))
        .await
        .unwrap();
    publisher.await.unwrap();

    assert_eq!(batch.len(), 1);
}

#[tokio::test]
async fn given_ids_not_issued_by_this_stream_when_acking_then_pending_is_untouched() {
    let bus = InMemoryEventBus::new();
    bus.ensure_group(StreamName::Events, GROUP).await.unwrap();
    let delivered = bus
        .publish(
            StreamName::Events,
            &StreamMessage::new(EventKind::JobCreated, JobId::new()),
        )
        .await
        .unwrap();
    bus.read_group(StreamName::Events, GROUP, "a", 10, Duration::ZERO)
        .await
        .unwrap();

    let foreign_sequence = format!("{}-1", delivered.as_str().split('-').next().unwrap());
    for id in ["1-0", "garbage", "0-99", foreign_sequence.as_str()] {
        bus.ack(StreamName::Events, GROUP, &MessageId::new(id))
            .await
            .unwrap();
    }
    assert_eq!(bus.pending(StreamName::Events, GROUP).await.unwrap().count, 1);

    bus.ack(StreamName::Events, GROUP, &delivered).await.unwrap();
    assert_eq!(bus.pending(StreamName::Events, GROUP).await.unwrap().count, 0);
}

#[tokio::test]
async fn given_claims_limited_to_one_when_claiming_twice_then_next_stale_entry_is_taken() {
    let bus = InMemoryEventBus::new();
    bus.ensure_group(StreamName::Events, GROUP).await.unwrap();
    for _ in 0..2 {
        bus.publish(
            StreamName::Events,
            &StreamMessage::new(EventKind::JobCreated, JobId::new()),
        )
        .await
        .unwrap();
    }
    let read = bus
        .read_group(StreamName::Events, GROUP, "a", 10, Duration::ZERO)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let min_idle = Duration::from_millis(20);
    let first = bus
        .claim_stale(StreamName::Events, GROUP, "b", min_idle, 1)
        .await
        .unwrap();
    let second = bus
        .claim_stale(StreamName::Events, GROUP, "b", min_idle, 1)
        .await
        .unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, read[0].id);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, read[1].id);
    assert_eq!(second[0].delivery_count, 2);
}
