use std::time::Duration;

use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

use dragoman::application::ports::{EventBus, StreamMessage};
use dragoman::domain::{EventKind, JobId, StreamName};
use dragoman::infrastructure::event_bus::RedisEventBus;

const GROUP: &str = "orchestrator";

async fn start_redis() -> (ContainerAsync<GenericImage>, RedisEventBus) {
    let container = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(ContainerPort::Tcp(6379))
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await
        .expect("Failed to start Redis container");
    let port = container
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get Redis port");

    let bus = RedisEventBus::connect(&format!("redis://127.0.0.1:{}", port), "test")
        .await
        .expect("Failed to connect to Redis");
    (container, bus)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn given_published_message_when_reading_group_then_fields_round_trip() {
    let (_container, bus) = start_redis().await;
    bus.ensure_group(StreamName::Events, GROUP).await.unwrap();
    bus.ensure_group(StreamName::Events, GROUP).await.unwrap();

    let job_id = JobId::new();
    let message = StreamMessage::new(EventKind::JobCreated, job_id)
        .with("success", true)
        .with("target_languages", serde_json::json!(["es", "fr"]))
        .with("file_id", "00012");
    bus.publish(StreamName::Events, &message).await.unwrap();

    let batch = bus
        .read_group(StreamName::Events, GROUP, "a", 10, Duration::from_millis(100))
        .await
        .unwrap();

    assert_eq!(batch.len(), 1);
    let received = &batch[0].message;
    assert_eq!(received.get_str("job_id"), Some(job_id.to_string()));
    assert_eq!(received.get_bool("success"), Some(true));
    assert_eq!(
        received.get("target_languages"),
        Some(&serde_json::json!(["es", "fr"]))
    );
    assert_eq!(received.get_str("file_id").as_deref(), Some("00012"));
    assert!(received.get_str("timestamp").is_some());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn given_unacked_message_when_idle_then_another_consumer_claims_it() {
    let (_container, bus) = start_redis().await;
    bus.ensure_group(StreamName::Events, GROUP).await.unwrap();
    bus.publish(
        StreamName::Events,
        &StreamMessage::new(EventKind::JobCreated, JobId::new()),
    )
    .await
    .unwrap();

    let first = bus
        .read_group(StreamName::Events, GROUP, "a", 10, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(first.len(), 1);

    let pending = bus.pending(StreamName::Events, GROUP).await.unwrap();
    assert_eq!(pending.count, 1);
    assert_eq!(pending.consumers, vec![("a".to_string(), 1)]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let claimed = bus
        .claim_stale(StreamName::Events, GROUP, "b", Duration::from_millis(10), 10)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, first[0].id);
    assert_eq!(claimed[0].delivery_count, 2);

    bus.ack(StreamName::Events, GROUP, &claimed[0].id).await.unwrap();
    assert_eq!(bus.pending(StreamName::Events, GROUP).await.unwrap().count, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn given_several_stale_messages_when_claiming_one_at_a_time_then_each_is_taken_in_turn() {
    let (_container, bus) = start_redis().await;
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
    assert_eq!(read.len(), 2);

    tokio::time::sleep(Duration::from_millis(50)).await;
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

    let pending = bus.pending(StreamName::Events, GROUP).await.unwrap();
    assert_eq!(pending.consumers, vec![("b".to_string(), 2)]);
}
