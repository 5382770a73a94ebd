use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};

use colbus_api::ProducerRecord;
use colbus_broker_memory::{MemoryBroker, MemoryBrokerConnector};
use colbus_producer::{PartitionerRegistry, Producer, ProducerConfig};

use crate::config::{DemoConfig, ProduceArgs};
use crate::error::DemoError;

pub async fn run(args: ProduceArgs) -> Result<(), DemoError> {
    let config = DemoConfig::load(args.config.as_deref())?;
    let producer_config = ProducerConfig::from_properties(&config.producer_properties()?)?;
    let broker = Arc::new(MemoryBroker::new(config.broker));
    let connector = MemoryBrokerConnector::new(broker);

    let producer: Producer<String, String> =
        Producer::connect(producer_config, &connector, &PartitionerRegistry::default())?;

    tracing::info!(topic = %args.topic, count = args.count, "publishing");

    let mut deliveries = FuturesUnordered::new();
    for i in 0..args.count {
        let record = ProducerRecord::new(args.topic.as_str(), format!("hunter{i}"));
        deliveries.push(producer.send(record).await?);
    }

    let mut failed = 0;
    while let Some(outcome) = deliveries.next().await {
        match outcome {
            Ok(meta) => {
                let offset = meta.offset.map_or(-1, |o| o as i64);
                println!("{}\t{}\t{}", meta.topic, offset, meta.partition);
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(error = %e, "record not delivered");
            }
        }
    }

    producer.close().await?;

    if failed > 0 {
        return Err(DemoError::Undelivered { failed, total: args.count });
    }
    Ok(())
}
