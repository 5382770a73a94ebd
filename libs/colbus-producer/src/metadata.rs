use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use colbus_api::ClusterView;

struct Cached {
    view: Arc<ClusterView>,
    fetched: Instant,
}

/// Partition layouts per topic, shared by `send` and the sender task.
///
/// An entry is stale once older than `max_age`, or as soon as a batch for
/// the topic fails in a way that suggests the layout moved.
pub(crate) struct MetadataCache {
    max_age: Duration,
    topics: RwLock<HashMap<String, Cached>>,
}

impl MetadataCache {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age, topics: RwLock::new(HashMap::new()) }
    }

    /// Cached view of `topic`, unless missing or stale.
    pub async fn fresh(&self, topic: &str) -> Option<Arc<ClusterView>> {
        let topics = self.topics.read().await;
        topics
            .get(topic)
            .filter(|c| c.fetched.elapsed() < self.max_age)
            .map(|c| c.view.clone())
    }

    pub async fn insert(&self, view: Arc<ClusterView>) {
        let cached = Cached { view: view.clone(), fetched: Instant::now() };
        self.topics.write().await.insert(view.topic.clone(), cached);
    }

    pub async fn invalidate(&self, topic: &str) {
        if self.topics.write().await.remove(topic).is_some() {
            tracing::debug!(topic, "metadata invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colbus_api::PartitionInfo;

    fn view(topic: &str) -> Arc<ClusterView> {
        Arc::new(ClusterView {
            topic: topic.into(),
            partitions: vec![PartitionInfo { id: 0, leader: Some(0) }],
        })
    }

    #[tokio::test]
    async fn invalidate_drops_entry() {
        let cache = MetadataCache::new(Duration::from_secs(60));
        cache.insert(view("t")).await;
        assert!(cache.fresh("t").await.is_some());
        cache.invalidate("t").await;
        assert!(cache.fresh("t").await.is_none());
    }

    #[tokio::test]
    async fn zero_max_age_never_serves_cache() {
        let cache = MetadataCache::new(Duration::ZERO);
        cache.insert(view("t")).await;
        assert!(cache.fresh("t").await.is_none());
    }
}
