use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::RwLock;

use colbus_api::{
    Acks, BackendError, BrokerConnector, BrokerTransport, ClusterView, PartitionInfo,
    ProduceRequest, ProduceResponse,
};

// ═══════════════════════════════════════════════════════════════
//  MemoryBrokerConfig
// ═══════════════════════════════════════════════════════════════

fn default_partitions() -> u32 {
    3
}

fn default_auto_create() -> bool {
    true
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MemoryBrokerConfig {
    /// Partition count of auto-created topics.
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    /// Create unknown topics on first metadata or produce request.
    #[serde(default = "default_auto_create")]
    pub auto_create_topics: bool,
    /// Id reported as leader of every partition.
    #[serde(default)]
    pub broker_id: u32,
}

impl Default for MemoryBrokerConfig {
    fn default() -> Self {
        Self {
            partitions: default_partitions(),
            auto_create_topics: default_auto_create(),
            broker_id: 0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Partition log
// ═══════════════════════════════════════════════════════════════

/// A record as appended to a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub offset: u64,
    pub key: Option<Bytes>,
    pub value: Bytes,
    pub timestamp_ms: i64,
}

#[derive(Debug)]
struct PartitionLog {
    leader: Option<u32>,
    records: Vec<StoredRecord>,
}

impl PartitionLog {
    fn new(leader: u32) -> Self {
        Self { leader: Some(leader), records: Vec::new() }
    }

    fn high_watermark(&self) -> u64 {
        self.records.len() as u64
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBroker
// ═══════════════════════════════════════════════════════════════

/// In-process partitioned broker. Each partition is an append-only log;
/// offsets start at 0 and grow by one per record with no gaps.
pub struct MemoryBroker {
    config: MemoryBrokerConfig,
    topics: RwLock<HashMap<String, Vec<PartitionLog>>>,
    available: AtomicBool,
    /// Produce requests still to be failed with a transient error.
    inject_failures: AtomicU32,
    produce_requests: AtomicU64,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(MemoryBrokerConfig::default())
    }
}

impl MemoryBroker {
    pub fn new(config: MemoryBrokerConfig) -> Self {
        Self {
            config,
            topics: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            inject_failures: AtomicU32::new(0),
            produce_requests: AtomicU64::new(0),
        }
    }

    /// Create a topic with an explicit partition count.
    pub async fn create_topic(&self, topic: &str, partitions: u32) -> Result<(), BackendError> {
        if partitions == 0 {
            return Err(BackendError::config("partition count must be positive"));
        }
        let mut topics = self.topics.write().await;
        if topics.contains_key(topic) {
            return Err(BackendError::already_exists(format!("topic '{topic}' already exists")));
        }
        topics.insert(topic.to_string(), self.new_partitions(partitions));
        tracing::info!(topic, partitions, "topic created");
        Ok(())
    }

    /// Next offset to be assigned in a partition.
    pub async fn high_watermark(&self, topic: &str, partition: u32) -> Option<u64> {
        let topics = self.topics.read().await;
        topics.get(topic)?.get(partition as usize).map(PartitionLog::high_watermark)
    }

    /// Copy of a partition's log.
    pub async fn records(&self, topic: &str, partition: u32) -> Vec<StoredRecord> {
        let topics = self.topics.read().await;
        topics
            .get(topic)
            .and_then(|parts| parts.get(partition as usize))
            .map(|log| log.records.clone())
            .unwrap_or_default()
    }

    /// Set or clear the leader of a partition.
    pub async fn set_leader(&self, topic: &str, partition: u32, leader: Option<u32>) {
        let mut topics = self.topics.write().await;
        if let Some(log) = topics.get_mut(topic).and_then(|p| p.get_mut(partition as usize)) {
            log.leader = leader;
        }
    }

    /// Simulate the broker going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        tracing::info!(available, "memory broker availability changed");
    }

    /// Fail the next `count` produce requests with a transient I/O error.
    pub fn inject_failures(&self, count: u32) {
        self.inject_failures.store(count, Ordering::SeqCst);
    }

    /// Produce requests received so far, failed ones included.
    pub fn produce_requests(&self) -> u64 {
        self.produce_requests.load(Ordering::SeqCst)
    }

    fn new_partitions(&self, count: u32) -> Vec<PartitionLog> {
        (0..count).map(|_| PartitionLog::new(self.config.broker_id)).collect()
    }

    fn ensure_available(&self) -> Result<(), BackendError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::unavailable("broker is unavailable"))
        }
    }

    fn take_injected_failure(&self) -> bool {
        self.inject_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn view_or_create(&self, topic: &str) -> Result<ClusterView, BackendError> {
        {
            let topics = self.topics.read().await;
            if let Some(parts) = topics.get(topic) {
                return Ok(view(topic, parts));
            }
        }
        if !self.config.auto_create_topics {
            return Err(BackendError::not_found(format!("unknown topic '{topic}'")));
        }
        let mut topics = self.topics.write().await;
        let parts = topics.entry(topic.to_string()).or_insert_with(|| {
            tracing::info!(topic, partitions = self.config.partitions, "topic auto-created");
            self.new_partitions(self.config.partitions)
        });
        Ok(view(topic, parts))
    }
}

fn view(topic: &str, parts: &[PartitionLog]) -> ClusterView {
    ClusterView {
        topic: topic.to_string(),
        partitions: parts
            .iter()
            .enumerate()
            .map(|(id, log)| PartitionInfo { id: id as u32, leader: log.leader })
            .collect(),
    }
}

impl BrokerTransport for MemoryBroker {
    fn metadata(
        &self,
        topic: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ClusterView, BackendError>> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move {
            self.ensure_available()?;
            self.view_or_create(&topic).await
        })
    }

    fn produce(
        &self,
        request: ProduceRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ProduceResponse, BackendError>> + Send + '_>> {
        Box::pin(async move {
            self.produce_requests.fetch_add(1, Ordering::SeqCst);
            self.ensure_available()?;
            if self.take_injected_failure() {
                return Err(BackendError::io("injected transient failure"));
            }
            self.view_or_create(&request.topic).await?;

            let mut topics = self.topics.write().await;
            let log = topics
                .get_mut(&request.topic)
                .and_then(|parts| parts.get_mut(request.partition as usize))
                .ok_or_else(|| {
                    BackendError::not_found(format!(
                        "unknown partition {}-{}",
                        request.topic, request.partition
                    ))
                })?;
            if log.leader.is_none() {
                return Err(BackendError::unavailable(format!(
                    "no leader for partition {}-{}",
                    request.topic, request.partition
                )));
            }

            let base = log.high_watermark();
            let count = request.records.len();
            for (i, record) in request.records.into_iter().enumerate() {
                log.records.push(StoredRecord {
                    offset: base + i as u64,
                    key: record.key,
                    value: record.value,
                    timestamp_ms: record.timestamp_ms,
                });
            }
            tracing::trace!(
                topic = %request.topic,
                partition = request.partition,
                base,
                count,
                "batch appended"
            );

            Ok(ProduceResponse {
                base_offset: match request.acks {
                    Acks::None => None,
                    Acks::Leader | Acks::All => Some(base),
                },
            })
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBrokerConnector
// ═══════════════════════════════════════════════════════════════

/// `BrokerConnector` handing out the shared `MemoryBroker` as transport.
#[derive(Clone)]
pub struct MemoryBrokerConnector {
    broker: Arc<MemoryBroker>,
}

impl MemoryBrokerConnector {
    pub fn new(broker: Arc<MemoryBroker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &Arc<MemoryBroker> {
        &self.broker
    }
}

impl BrokerConnector for MemoryBrokerConnector {
    fn connect(&self, bootstrap_servers: &[String]) -> Result<Arc<dyn BrokerTransport>, BackendError> {
        if bootstrap_servers.is_empty() {
            return Err(BackendError::config("bootstrap.servers is empty"));
        }
        self.broker
            .ensure_available()
            .map_err(|e| e.with_context(format!("bootstrap {}", bootstrap_servers.join(","))))?;
        tracing::debug!(servers = ?bootstrap_servers, "memory broker transport opened");
        Ok(self.broker.clone())
    }
}
