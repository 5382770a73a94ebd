mod accumulator;
pub mod config;
pub mod error;
mod metadata;
pub mod partitioner;
mod sender;
pub mod serializer;

pub use config::{ProducerConfig, Properties, SerializerFormat};
pub use error::ProducerError;
pub use partitioner::{
    DefaultPartitioner, PartitionerFactory, PartitionerRegistry, RoundRobinPartitioner, murmur2,
};
pub use serializer::Serializable;

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;

use colbus_api::{
    BackendError, BrokerConnector, BrokerTransport, ClusterView, PartitionInfo, Partitioner,
    ProducerRecord, RecordMetadata, WireRecord,
};

use accumulator::{Completion, PendingRecord};
use metadata::MetadataCache;
use sender::Command;

// ═══════════════════════════════════════════════════════════════
//  DeliveryFuture
// ═══════════════════════════════════════════════════════════════

/// Resolves once the record's batch has been acknowledged or has failed.
///
/// Dropping it does not cancel the send.
#[derive(Debug)]
pub struct DeliveryFuture {
    rx: oneshot::Receiver<Result<RecordMetadata, ProducerError>>,
}

impl Future for DeliveryFuture {
    type Output = Result<RecordMetadata, ProducerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ProducerError::Closed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Producer
// ═══════════════════════════════════════════════════════════════

/// Asynchronous partitioned producer.
///
/// `send` only enqueues; a background task groups records into
/// per-partition batches and delivers them. `close` waits for all of it.
pub struct Producer<K, V> {
    config: Arc<ProducerConfig>,
    transport: Arc<dyn BrokerTransport>,
    partitioner: Arc<dyn Partitioner>,
    metadata: Arc<MetadataCache>,
    buffer: Arc<Semaphore>,
    tx: mpsc::UnboundedSender<Command>,
    sender: JoinHandle<()>,
    _types: PhantomData<fn(K, V)>,
}

impl<K, V> std::fmt::Debug for Producer<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<K, V> Producer<K, V>
where
    K: Serializable + Send,
    V: Serializable + Send,
{
    /// Validate `config`, connect and start the background sender.
    ///
    /// Must be called from within a tokio runtime; outside one it returns
    /// [`ProducerError::Config`].
    pub fn connect(
        config: ProducerConfig,
        connector: &dyn BrokerConnector,
        registry: &PartitionerRegistry,
    ) -> Result<Self, ProducerError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ProducerError::Config("producer must be connected from within a tokio runtime".into())
        })?;
        config.validate()?;
        if K::FORMAT != config.key_serializer {
            return Err(ProducerError::Config(format!(
                "key type serializes as {} but key.serializer is {}",
                K::FORMAT,
                config.key_serializer
            )));
        }
        if V::FORMAT != config.value_serializer {
            return Err(ProducerError::Config(format!(
                "value type serializes as {} but value.serializer is {}",
                V::FORMAT,
                config.value_serializer
            )));
        }

        let partitioner = registry.resolve(&config.partitioner)?;
        let transport = connector
            .connect(&config.bootstrap_servers)
            .map_err(|e| ProducerError::Backend(e.with_context("connect")))?;

        let config = Arc::new(config);
        let metadata = Arc::new(MetadataCache::new(config.metadata_max_age));
        let (tx, rx) = mpsc::unbounded_channel();
        let sender =
            runtime.spawn(sender::run(rx, transport.clone(), config.clone(), metadata.clone()));

        tracing::info!(
            servers = ?config.bootstrap_servers,
            acks = %config.acks,
            partitioner = %config.partitioner,
            "producer connected"
        );

        Ok(Self {
            buffer: Arc::new(Semaphore::new(config.buffer_memory)),
            config,
            transport,
            partitioner,
            metadata,
            tx,
            sender,
            _types: PhantomData,
        })
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Enqueue a record and return without waiting for delivery.
    ///
    /// Waits at most `max.block.ms` for topic metadata and buffer space.
    pub async fn send(&self, record: ProducerRecord<K, V>) -> Result<DeliveryFuture, ProducerError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(record, Completion::Future(tx)).await?;
        Ok(DeliveryFuture { rx })
    }

    /// Like [`send`](Self::send), but hands the outcome to `callback`.
    ///
    /// The callback runs on the producer's dispatch task once the batch
    /// completes; [`flush`](Self::flush) and [`close`](Self::close) return
    /// only after it has run. Keep it short and non-blocking.
    pub async fn send_with_callback<F>(
        &self,
        record: ProducerRecord<K, V>,
        callback: F,
    ) -> Result<(), ProducerError>
    where
        F: FnOnce(Result<RecordMetadata, ProducerError>) + Send + 'static,
    {
        self.enqueue(record, Completion::Callback(Box::new(callback))).await
    }

    async fn enqueue(
        &self,
        record: ProducerRecord<K, V>,
        completion: Completion,
    ) -> Result<(), ProducerError> {
        let ProducerRecord { topic, partition, key, value, timestamp_ms } = record;
        let wire = WireRecord {
            key: key.as_ref().map(|k| k.to_bytes()),
            value: value.to_bytes(),
            timestamp_ms: timestamp_ms.unwrap_or_else(colbus_api::now_ms),
        };
        let size = wire.size();
        if size > self.config.buffer_memory {
            return Err(ProducerError::RecordTooLarge { size, limit: self.config.buffer_memory });
        }

        let cluster = self.cluster_view(&topic).await?;
        let count = cluster.partition_count();
        let partition = match partition {
            Some(p) => p,
            None => self.partitioner.choose_partition(
                &topic,
                wire.key.as_deref(),
                &wire.value,
                &cluster,
            ),
        };
        if partition >= count {
            return Err(ProducerError::InvalidPartition { topic, partition, count });
        }

        // buffer_memory is validated to fit in u32 and size <= buffer_memory
        let permit = tokio::time::timeout(
            self.config.max_block,
            self.buffer.clone().acquire_many_owned(size as u32),
        )
        .await
        .map_err(|_| ProducerError::BufferExhausted { waited: self.config.max_block })?
        .map_err(|_| ProducerError::Closed)?;

        let pending = PendingRecord {
            topic,
            partition,
            serialized_key_size: wire.key.as_ref().map(|k| k.len()),
            record: wire,
            completion,
            permit,
        };
        self.tx.send(Command::Append(pending)).map_err(|_| ProducerError::Closed)?;
        Ok(())
    }

    /// Current partition layout of `topic`, fetched from the broker.
    pub async fn partitions_for(&self, topic: &str) -> Result<Vec<PartitionInfo>, ProducerError> {
        let view = self.fetch_metadata(topic).await?;
        Ok(view.partitions.clone())
    }

    /// Send everything buffered and wait until no batch is in flight.
    pub async fn flush(&self) -> Result<(), ProducerError> {
        let (done, rx) = oneshot::channel();
        self.tx.send(Command::Flush(done)).map_err(|_| ProducerError::Closed)?;
        rx.await.map_err(|_| ProducerError::Closed)
    }

    /// Stop accepting records and wait until every record sent so far has
    /// completed, successfully or not.
    pub async fn close(self) -> Result<(), ProducerError> {
        let Producer { tx, sender, .. } = self;
        drop(tx);
        sender.await.map_err(|e| {
            tracing::error!(error = %e, "producer sender aborted");
            ProducerError::Closed
        })?;
        tracing::info!("producer closed");
        Ok(())
    }

    /// Cached layout of `topic`, refetched once older than
    /// `metadata.max.age.ms` or after a batch lost its leader.
    async fn cluster_view(&self, topic: &str) -> Result<Arc<ClusterView>, ProducerError> {
        match self.metadata.fresh(topic).await {
            Some(view) => Ok(view),
            None => self.fetch_metadata(topic).await,
        }
    }

    async fn fetch_metadata(&self, topic: &str) -> Result<Arc<ClusterView>, ProducerError> {
        let view = tokio::time::timeout(self.config.max_block, self.transport.metadata(topic))
            .await
            .map_err(|_| {
                BackendError::unavailable(format!(
                    "metadata for '{topic}' not available after {:?}",
                    self.config.max_block
                ))
            })?
            .map_err(|e| e.with_context(format!("metadata for '{topic}'")))?;
        if view.partitions.is_empty() {
            return Err(BackendError::not_found(format!("topic '{topic}' has no partitions")).into());
        }
        tracing::debug!(topic, partitions = view.partition_count(), "metadata refreshed");
        let view = Arc::new(view);
        self.metadata.insert(view.clone()).await;
        Ok(view)
    }
}
