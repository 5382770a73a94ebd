use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use colbus_api::{ClusterView, Partitioner};

use crate::error::ProducerError;

/// Builds a fresh partitioner instance for one producer.
pub type PartitionerFactory = Arc<dyn Fn() -> Arc<dyn Partitioner> + Send + Sync>;

// ═══════════════════════════════════════════════════════════════
//  Registry
// ═══════════════════════════════════════════════════════════════

/// Partitioning strategies by name, as referenced by `partitioner.class`.
///
/// Comes with `default` and `round_robin` (plus the broker's Java class
/// names for both). Callers register their own under any name.
#[derive(Clone)]
pub struct PartitionerRegistry {
    factories: HashMap<String, PartitionerFactory>,
}

impl Default for PartitionerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        let default: PartitionerFactory =
            Arc::new(|| Arc::new(DefaultPartitioner::new()) as Arc<dyn Partitioner>);
        let round_robin: PartitionerFactory =
            Arc::new(|| Arc::new(RoundRobinPartitioner::new()) as Arc<dyn Partitioner>);
        registry.register_factory("default", default.clone());
        registry.register_factory(
            "org.apache.kafka.clients.producer.internals.DefaultPartitioner",
            default,
        );
        registry.register_factory("round_robin", round_robin.clone());
        registry.register_factory(
            "org.apache.kafka.clients.producer.RoundRobinPartitioner",
            round_robin,
        );
        registry
    }
}

impl std::fmt::Debug for PartitionerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionerRegistry").field("names", &self.names()).finish()
    }
}

impl PartitionerRegistry {
    /// Registry without built-ins.
    pub fn empty() -> Self {
        Self { factories: HashMap::new() }
    }

    pub fn register_factory(&mut self, name: impl Into<String>, factory: PartitionerFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Register one instance, shared by every producer resolving `name`.
    pub fn register(&mut self, name: impl Into<String>, partitioner: Arc<dyn Partitioner>) {
        self.register_factory(name, Arc::new(move || partitioner.clone()));
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Partitioner>, ProducerError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ProducerError::Config(format!("unknown partitioner '{name}'")))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

// ═══════════════════════════════════════════════════════════════
//  Built-in strategies
// ═══════════════════════════════════════════════════════════════

/// Per-topic rotating counter over the available partitions.
#[derive(Debug, Default)]
struct RoundRobin {
    counters: Mutex<HashMap<String, u32>>,
}

impl RoundRobin {
    fn next(&self, topic: &str, cluster: &ClusterView) -> u32 {
        let n = {
            let mut counters = match self.counters.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            let counter = counters.entry(topic.to_string()).or_insert(0);
            let n = *counter;
            *counter = counter.wrapping_add(1);
            n
        };
        let available = cluster.available_partitions();
        if available.is_empty() {
            n % cluster.partition_count().max(1)
        } else {
            available[(n as usize) % available.len()]
        }
    }
}

/// Keyed records go to `murmur2(key) % partitions`, so equal keys always
/// share a partition. Keyless records rotate over available partitions.
#[derive(Debug, Default)]
pub struct DefaultPartitioner {
    keyless: RoundRobin,
}

impl DefaultPartitioner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Partitioner for DefaultPartitioner {
    fn choose_partition(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        _value: &[u8],
        cluster: &ClusterView,
    ) -> u32 {
        match key {
            Some(key) => to_positive(murmur2(key)) % cluster.partition_count().max(1),
            None => self.keyless.next(topic, cluster),
        }
    }
}

/// Spreads records evenly over available partitions, ignoring keys.
#[derive(Debug, Default)]
pub struct RoundRobinPartitioner {
    inner: RoundRobin,
}

impl RoundRobinPartitioner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Partitioner for RoundRobinPartitioner {
    fn choose_partition(
        &self,
        topic: &str,
        _key: Option<&[u8]>,
        _value: &[u8],
        cluster: &ClusterView,
    ) -> u32 {
        self.inner.next(topic, cluster)
    }
}

// ═══════════════════════════════════════════════════════════════
//  murmur2
// ═══════════════════════════════════════════════════════════════

/// 32-bit murmur2 with the seed the broker's own clients use, so keyed
/// records land on the same partition whichever client produced them.
pub fn murmur2(data: &[u8]) -> i32 {
    const SEED: u32 = 0x9747_b28c;
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let mut h = SEED ^ data.len() as u32;
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if tail.len() >= 3 {
        h ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        h ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        h ^= tail[0] as u32;
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h as i32
}

fn to_positive(n: i32) -> u32 {
    (n & 0x7fff_ffff) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use colbus_api::PartitionInfo;

    fn cluster(count: u32) -> ClusterView {
        ClusterView {
            topic: "t".into(),
            partitions: (0..count).map(|id| PartitionInfo { id, leader: Some(0) }).collect(),
        }
    }

    #[test]
    fn murmur2_matches_reference_vectors() {
        assert_eq!(murmur2(b"21"), -973_932_308);
        assert_eq!(murmur2(b"foobar"), -790_332_482);
        assert_eq!(murmur2(b"a-little-bit-long-string"), -985_981_536);
        assert_eq!(murmur2(b"a-little-bit-longer-string"), -1_486_304_829);
        assert_eq!(murmur2(b"abc"), 479_470_107);
    }

    #[test]
    fn keyed_records_are_sticky() {
        let p = DefaultPartitioner::new();
        let view = cluster(5);
        let first = p.choose_partition("t", Some(b"user-42".as_slice()), b"a", &view);
        for _ in 0..10 {
            assert_eq!(p.choose_partition("t", Some(b"user-42".as_slice()), b"b", &view), first);
        }
        assert!(first < 5);
    }

    #[test]
    fn keyless_records_rotate() {
        let p = DefaultPartitioner::new();
        let view = cluster(3);
        let picks: Vec<_> = (0..6).map(|_| p.choose_partition("t", None, b"v", &view)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn round_robin_skips_leaderless_partitions() {
        let p = RoundRobinPartitioner::new();
        let mut view = cluster(3);
        view.partitions[1].leader = None;
        let picks: Vec<_> =
            (0..4).map(|_| p.choose_partition("t", Some(b"k".as_slice()), b"v", &view)).collect();
        assert_eq!(picks, vec![0, 2, 0, 2]);
    }

    #[test]
    fn registry_resolves_builtins_and_custom() {
        struct Fixed;
        impl Partitioner for Fixed {
            fn choose_partition(&self, _: &str, _: Option<&[u8]>, _: &[u8], _: &ClusterView) -> u32 {
                1
            }
        }

        let mut registry = PartitionerRegistry::default();
        assert!(registry.resolve("default").is_ok());
        assert!(registry.resolve("org.apache.kafka.clients.producer.RoundRobinPartitioner").is_ok());
        assert!(registry.resolve("com.example.Partition").is_err());

        registry.register("fixed", Arc::new(Fixed));
        let fixed = registry.resolve("fixed").unwrap();
        assert_eq!(fixed.choose_partition("t", None, b"v", &cluster(3)), 1);
    }
}
