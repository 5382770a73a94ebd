use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};

use colbus_api::{Acks, ProducerRecord};
use colbus_broker_memory::{MemoryBroker, MemoryBrokerConfig, MemoryBrokerConnector};
use colbus_producer::{
    Producer, ProducerConfig, ProducerError, Properties, PartitionerRegistry, SerializerFormat,
};

fn broker(partitions: u32) -> (Arc<MemoryBroker>, MemoryBrokerConnector) {
    let broker = Arc::new(MemoryBroker::new(MemoryBrokerConfig {
        partitions,
        ..MemoryBrokerConfig::default()
    }));
    let connector = MemoryBrokerConnector::new(broker.clone());
    (broker, connector)
}

fn config() -> ProducerConfig {
    let mut config = ProducerConfig::new(["localhost:9092"]);
    config.retries = 0;
    config.retry_backoff = Duration::from_millis(1);
    config
}

fn connect(
    config: ProducerConfig,
    connector: &MemoryBrokerConnector,
) -> Producer<String, String> {
    Producer::connect(config, connector, &PartitionerRegistry::default()).unwrap()
}

async fn send_all(producer: &Producer<String, String>, topic: &str, count: usize) -> Vec<(u32, u64)> {
    let mut pending = FuturesUnordered::new();
    for i in 0..count {
        let record = ProducerRecord::new(topic, format!("hunter{i}"));
        pending.push(producer.send(record).await.unwrap());
    }
    let mut landed = Vec::new();
    while let Some(outcome) = pending.next().await {
        let meta = outcome.unwrap();
        landed.push((meta.partition, meta.offset.unwrap()));
    }
    landed
}

#[tokio::test]
async fn ninety_nine_records_get_gap_free_offsets() {
    let (broker, connector) = broker(3);

    let warmup = connect(config(), &connector);
    send_all(&warmup, "yuandan", 5).await;
    warmup.close().await.unwrap();

    let mut before = BTreeMap::new();
    for p in 0..3 {
        before.insert(p, broker.high_watermark("yuandan", p).await.unwrap());
    }

    let mut config = config();
    config.acks = Acks::All;
    let producer = connect(config, &connector);
    let landed = send_all(&producer, "yuandan", 99).await;
    producer.close().await.unwrap();
    assert_eq!(landed.len(), 99);

    let mut by_partition: BTreeMap<u32, Vec<u64>> = BTreeMap::new();
    for (partition, offset) in landed {
        by_partition.entry(partition).or_default().push(offset);
    }
    for (partition, mut offsets) in by_partition {
        offsets.sort();
        let start = before[&partition];
        let expected: Vec<u64> = (start..start + offsets.len() as u64).collect();
        assert_eq!(offsets, expected, "partition {partition}");
        assert_eq!(
            broker.high_watermark("yuandan", partition).await,
            Some(start + offsets.len() as u64)
        );
    }
}

#[tokio::test]
async fn close_completes_every_outstanding_send() {
    let (broker, connector) = broker(2);
    let mut config = config();
    config.linger = Duration::from_secs(60);
    let producer = connect(config, &connector);

    let mut deliveries = Vec::new();
    for i in 0..10 {
        deliveries.push(producer.send(ProducerRecord::new("t", format!("v{i}"))).await.unwrap());
    }
    producer.close().await.unwrap();

    for delivery in deliveries {
        assert!(delivery.now_or_never().expect("completed before close returned").is_ok());
    }
    let total = broker.records("t", 0).await.len() + broker.records("t", 1).await.len();
    assert_eq!(total, 10);
}

#[tokio::test]
async fn flush_delivers_lingering_batches() {
    let (_broker, connector) = broker(1);
    let mut config = config();
    config.linger = Duration::from_secs(60);
    let producer = connect(config, &connector);

    let delivery = producer.send(ProducerRecord::new("t", "a".to_string())).await.unwrap();
    producer.flush().await.unwrap();
    let meta = delivery.now_or_never().expect("flushed").unwrap();
    assert_eq!(meta.offset, Some(0));
    producer.close().await.unwrap();
}

#[tokio::test]
async fn broker_outage_fails_the_batch() {
    let (broker, connector) = broker(1);
    let producer = connect(config(), &connector);
    producer.partitions_for("t").await.unwrap();

    broker.set_available(false);
    let delivery = producer.send(ProducerRecord::new("t", "a".to_string())).await.unwrap();
    let err = delivery.await.unwrap_err();
    assert!(matches!(err, ProducerError::Send { partition: 0, .. }), "{err}");
    producer.close().await.unwrap();
}

#[tokio::test]
async fn metadata_outage_fails_send() {
    let (broker, connector) = broker(1);
    let producer = connect(config(), &connector);
    broker.set_available(false);
    let err = producer.send(ProducerRecord::new("t", "a".to_string())).await.unwrap_err();
    assert!(matches!(err, ProducerError::Backend(_)));
    producer.close().await.unwrap();
}

#[tokio::test]
async fn connect_fails_while_broker_is_down() {
    let (broker, connector) = broker(1);
    broker.set_available(false);
    let err = Producer::<String, String>::connect(config(), &connector, &PartitionerRegistry::default())
        .unwrap_err();
    assert!(matches!(err, ProducerError::Backend(_)));
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let (broker, connector) = broker(1);
    let mut config = config();
    config.retries = 3;
    let producer = connect(config, &connector);

    broker.inject_failures(2);
    let meta = producer
        .send(ProducerRecord::new("t", "a".to_string()))
        .await
        .unwrap()
        .await
        .unwrap();
    assert_eq!(meta.offset, Some(0));
    assert_eq!(broker.produce_requests(), 3);
    producer.close().await.unwrap();
}

#[tokio::test]
async fn retries_zero_gives_up_on_first_failure() {
    let (broker, connector) = broker(1);
    let producer = connect(config(), &connector);

    broker.inject_failures(1);
    let outcome = producer.send(ProducerRecord::new("t", "a".to_string())).await.unwrap().await;
    assert!(matches!(outcome, Err(ProducerError::Send { .. })));
    assert_eq!(broker.produce_requests(), 1);
    producer.close().await.unwrap();
}

#[tokio::test]
async fn acks_zero_reports_no_offset() {
    let (broker, connector) = broker(1);
    let mut config = config();
    config.acks = Acks::None;
    let producer = connect(config, &connector);

    let meta = producer
        .send(ProducerRecord::new("t", "a".to_string()))
        .await
        .unwrap()
        .await
        .unwrap();
    assert_eq!(meta.offset, None);
    producer.close().await.unwrap();
    assert_eq!(broker.records("t", 0).await.len(), 1);
}

#[tokio::test]
async fn record_larger_than_buffer_is_rejected() {
    let (_broker, connector) = broker(1);
    let mut config = config();
    config.buffer_memory = 4;
    let producer = connect(config, &connector);

    let err = producer.send(ProducerRecord::new("t", "hunter1".to_string())).await.unwrap_err();
    assert!(matches!(err, ProducerError::RecordTooLarge { size: 7, limit: 4 }));
    producer.close().await.unwrap();
}

#[tokio::test]
async fn full_buffer_blocks_until_max_block() {
    let (_broker, connector) = broker(1);
    let mut config = config();
    config.buffer_memory = 10;
    config.linger = Duration::from_secs(60);
    config.max_block = Duration::from_millis(50);
    let producer = connect(config, &connector);

    let first = producer.send(ProducerRecord::new("t", "12345678".to_string())).await.unwrap();
    let err = producer.send(ProducerRecord::new("t", "12345678".to_string())).await.unwrap_err();
    assert!(matches!(err, ProducerError::BufferExhausted { .. }));

    producer.close().await.unwrap();
    assert!(first.await.is_ok());
}

#[tokio::test]
async fn explicit_partition_out_of_range() {
    let (_broker, connector) = broker(3);
    let producer = connect(config(), &connector);

    let record = ProducerRecord::new("t", "a".to_string()).with_partition(3);
    let err = producer.send(record).await.unwrap_err();
    assert!(matches!(err, ProducerError::InvalidPartition { partition: 3, count: 3, .. }));

    let record = ProducerRecord::new("t", "a".to_string()).with_partition(2);
    let meta = producer.send(record).await.unwrap().await.unwrap();
    assert_eq!(meta.partition, 2);
    producer.close().await.unwrap();
}

#[tokio::test]
async fn equal_keys_share_a_partition() {
    let (broker, connector) = broker(4);
    let producer = connect(config(), &connector);

    let mut partitions = Vec::new();
    for i in 0..8 {
        let record = ProducerRecord::new("t", format!("v{i}")).with_key("user-7".to_string());
        partitions.push(producer.send(record).await.unwrap().await.unwrap().partition);
    }
    producer.close().await.unwrap();

    assert!(partitions.windows(2).all(|w| w[0] == w[1]));
    let stored = broker.records("t", partitions[0]).await;
    assert_eq!(stored.len(), 8);
    assert!(stored.iter().all(|r| r.key.as_deref() == Some(b"user-7".as_slice())));
}

#[tokio::test]
async fn close_waits_for_every_callback() {
    let (_broker, connector) = broker(3);
    let producer = connect(config(), &connector);
    let called = Arc::new(AtomicUsize::new(0));
    let offsets = Arc::new(Mutex::new(Vec::new()));

    for i in 0..50 {
        let called = called.clone();
        let offsets = offsets.clone();
        producer
            .send_with_callback(ProducerRecord::new("t", format!("v{i}")), move |outcome| {
                let meta = outcome.unwrap();
                offsets.lock().unwrap().push((meta.partition, meta.offset.unwrap()));
                called.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
    }
    producer.close().await.unwrap();

    assert_eq!(called.load(Ordering::SeqCst), 50);
    let mut offsets = offsets.lock().unwrap().clone();
    offsets.sort();
    offsets.dedup();
    assert_eq!(offsets.len(), 50);
}

#[tokio::test]
async fn flush_waits_for_callbacks() {
    let (_broker, connector) = broker(1);
    let producer = connect(config(), &connector);
    let called = Arc::new(AtomicUsize::new(0));

    for i in 0..5 {
        let called = called.clone();
        producer
            .send_with_callback(ProducerRecord::new("t", format!("v{i}")), move |outcome| {
                assert!(outcome.is_ok());
                called.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
    }
    producer.flush().await.unwrap();
    assert_eq!(called.load(Ordering::SeqCst), 5);
    producer.close().await.unwrap();
}

#[tokio::test]
async fn leader_loss_refreshes_metadata() {
    let (broker, connector) = broker(3);
    let mut config = config();
    config.partitioner = "round_robin".to_string();
    let producer = connect(config, &connector);

    let first = producer.send(ProducerRecord::new("t", "a".to_string())).await.unwrap();
    assert_eq!(first.await.unwrap().partition, 0);

    broker.set_leader("t", 1, None).await;

    // Cached layout still lists partition 1 as led.
    let lost = producer.send(ProducerRecord::new("t", "b".to_string())).await.unwrap();
    assert!(matches!(lost.await, Err(ProducerError::Send { partition: 1, .. })));

    for i in 0..6 {
        let delivery = producer.send(ProducerRecord::new("t", format!("c{i}"))).await.unwrap();
        let meta = delivery.await.unwrap();
        assert_ne!(meta.partition, 1);
    }
    producer.close().await.unwrap();

    assert_eq!(broker.high_watermark("t", 1).await, Some(0));
    let delivered = broker.high_watermark("t", 0).await.unwrap()
        + broker.high_watermark("t", 2).await.unwrap();
    assert_eq!(delivered, 7);
}

#[tokio::test]
async fn expired_metadata_is_refetched() {
    let (broker, connector) = broker(3);
    let mut config = config();
    config.partitioner = "round_robin".to_string();
    config.metadata_max_age = Duration::ZERO;
    let producer = connect(config, &connector);

    let first = producer.send(ProducerRecord::new("t", "a".to_string())).await.unwrap();
    first.await.unwrap();

    broker.set_leader("t", 1, None).await;

    for i in 0..6 {
        let delivery = producer.send(ProducerRecord::new("t", format!("b{i}"))).await.unwrap();
        assert_ne!(delivery.await.unwrap().partition, 1);
    }
    producer.close().await.unwrap();
    assert_eq!(broker.high_watermark("t", 1).await, Some(0));
}

#[test]
fn connect_outside_runtime_is_a_config_error() {
    let (_broker, connector) = broker(1);
    let err = Producer::<String, String>::connect(config(), &connector, &PartitionerRegistry::default())
        .unwrap_err();
    assert!(matches!(err, ProducerError::Config(_)));
}

#[tokio::test]
async fn serializer_must_match_types() {
    let (_broker, connector) = broker(1);
    let registry = PartitionerRegistry::default();

    let err = Producer::<String, Bytes>::connect(config(), &connector, &registry).unwrap_err();
    assert!(matches!(err, ProducerError::Config(_)));

    let mut config = config();
    config.value_serializer = SerializerFormat::Bytes;
    let producer = Producer::<String, Bytes>::connect(config, &connector, &registry).unwrap();
    producer.close().await.unwrap();
}

#[tokio::test]
async fn unknown_partitioner_is_a_config_error() {
    let (_broker, connector) = broker(1);
    let mut config = config();
    config.partitioner = "com.example.Nope".into();
    let err = Producer::<String, String>::connect(config, &connector, &PartitionerRegistry::default())
        .unwrap_err();
    assert!(matches!(err, ProducerError::Config(_)));
}

#[tokio::test]
async fn builds_from_demo_properties() {
    let (broker, connector) = broker(3);
    let props: Properties = [
        ("bootstrap.servers", "192.168.133.128:9092"),
        ("acks", "all"),
        ("retries", "0"),
        ("batch.size", "10241"),
        ("buffer.memory", "12341235"),
        ("key.serializer", "org.apache.kafka.common.serialization.StringSerializer"),
        ("value.serializer", "org.apache.kafka.common.serialization.StringSerializer"),
        ("partitioner.class", "round_robin"),
    ]
    .into_iter()
    .collect();
    let config = ProducerConfig::from_properties(&props).unwrap();
    let producer = connect(config, &connector);

    let landed = send_all(&producer, "yuandan", 6).await;
    producer.close().await.unwrap();

    let mut partitions: Vec<u32> = landed.iter().map(|(p, _)| *p).collect();
    partitions.sort();
    assert_eq!(partitions, vec![0, 0, 1, 1, 2, 2]);
    assert_eq!(broker.high_watermark("yuandan", 2).await, Some(2));
}
