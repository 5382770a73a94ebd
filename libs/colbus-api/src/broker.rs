use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::BackendError;

// ════════════════════════════════════════════════════════════════
//  Records
// ════════════════════════════════════════════════════════════════

/// Record handed to a producer before serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerRecord<K, V> {
    pub topic: String,
    /// Explicit partition. When set the partitioner is not consulted.
    pub partition: Option<u32>,
    pub key: Option<K>,
    pub value: V,
    /// Create time. `None` = stamped when the record is enqueued.
    pub timestamp_ms: Option<i64>,
}

impl<K, V> ProducerRecord<K, V> {
    pub fn new(topic: impl Into<String>, value: V) -> Self {
        Self { topic: topic.into(), partition: None, key: None, value, timestamp_ms: None }
    }

    pub fn with_key(mut self, key: K) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_partition(mut self, partition: u32) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }
}

/// Serialized record as it travels to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRecord {
    pub key: Option<Bytes>,
    pub value: Bytes,
    pub timestamp_ms: i64,
}

impl WireRecord {
    pub fn size(&self) -> usize {
        self.key.as_ref().map_or(0, Bytes::len) + self.value.len()
    }
}

/// Where a record landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: u32,
    /// `None` when the producer runs with `acks=0` and the broker never answers.
    pub offset: Option<u64>,
    pub timestamp_ms: i64,
    pub serialized_key_size: Option<usize>,
    pub serialized_value_size: usize,
}

// ════════════════════════════════════════════════════════════════
//  Acknowledgment mode
// ════════════════════════════════════════════════════════════════

/// How many replicas must confirm a write before the broker answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Acks {
    /// `acks=0`: fire and forget, no offset reported.
    None,
    /// `acks=1`: partition leader only.
    Leader,
    /// `acks=all` / `acks=-1`: every in-sync replica.
    #[default]
    All,
}

impl FromStr for Acks {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(Acks::None),
            "1" => Ok(Acks::Leader),
            "all" | "-1" => Ok(Acks::All),
            other => Err(BackendError::config(format!(
                "acks must be one of 0, 1, all, -1 (got '{other}')"
            ))),
        }
    }
}

impl fmt::Display for Acks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acks::None => f.write_str("0"),
            Acks::Leader => f.write_str("1"),
            Acks::All => f.write_str("all"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Cluster metadata
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub id: u32,
    /// Broker currently leading the partition, `None` while leaderless.
    pub leader: Option<u32>,
}

/// Partition layout of one topic as the broker last reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterView {
    pub topic: String,
    pub partitions: Vec<PartitionInfo>,
}

impl ClusterView {
    pub fn partition_count(&self) -> u32 {
        self.partitions.len() as u32
    }

    /// Partitions that currently have a leader, in id order.
    pub fn available_partitions(&self) -> Vec<u32> {
        self.partitions.iter().filter(|p| p.leader.is_some()).map(|p| p.id).collect()
    }
}

// ════════════════════════════════════════════════════════════════
//  Partitioner
// ════════════════════════════════════════════════════════════════

/// Strategy picking the partition of a record that has none set.
///
/// Implementations are selected by name (`partitioner.class`) and must
/// return an index below `cluster.partition_count()`.
pub trait Partitioner: Send + Sync {
    fn choose_partition(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        value: &[u8],
        cluster: &ClusterView,
    ) -> u32;
}

// ════════════════════════════════════════════════════════════════
//  Transport
// ════════════════════════════════════════════════════════════════

/// One batch of records for one partition.
#[derive(Debug, Clone)]
pub struct ProduceRequest {
    pub topic: String,
    pub partition: u32,
    pub acks: Acks,
    pub records: Vec<WireRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponse {
    /// Offset of the first record of the batch; the rest follow contiguously.
    /// `None` under `acks=0`.
    pub base_offset: Option<u64>,
}

/// Opens a transport to a broker cluster.
pub trait BrokerConnector: Send + Sync {
    fn connect(&self, bootstrap_servers: &[String]) -> Result<Arc<dyn BrokerTransport>, BackendError>;
}

/// Request/response channel to the broker cluster.
pub trait BrokerTransport: Send + Sync {
    /// Partition layout of `topic`.
    fn metadata(
        &self,
        topic: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ClusterView, BackendError>> + Send + '_>>;

    /// Append a batch to one partition.
    fn produce(
        &self,
        request: ProduceRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ProduceResponse, BackendError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acks_parse() {
        assert_eq!("0".parse::<Acks>().unwrap(), Acks::None);
        assert_eq!("1".parse::<Acks>().unwrap(), Acks::Leader);
        assert_eq!("all".parse::<Acks>().unwrap(), Acks::All);
        assert_eq!("-1".parse::<Acks>().unwrap(), Acks::All);
        assert!("2".parse::<Acks>().is_err());
    }

    #[test]
    fn available_partitions_skip_leaderless() {
        let view = ClusterView {
            topic: "t".into(),
            partitions: vec![
                PartitionInfo { id: 0, leader: Some(1) },
                PartitionInfo { id: 1, leader: None },
                PartitionInfo { id: 2, leader: Some(1) },
            ],
        };
        assert_eq!(view.partition_count(), 3);
        assert_eq!(view.available_partitions(), vec![0, 2]);
    }
}
