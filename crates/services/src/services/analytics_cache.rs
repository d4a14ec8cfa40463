use std::{sync::Arc, time::Duration};

use moka::future::Cache;
use serde_json::Value;

const MAX_ENTRIES: u64 = 10_000;

/// In-process cache of analytics API responses, keyed by the full request string.
#[derive(Clone)]
pub struct AnalyticsCache {
    inner: Cache<String, Arc<Value>>,
    ttl: Duration,
}

impl AnalyticsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Value>> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: String, value: Value) -> Arc<Value> {
        let value = Arc::new(value);
        self.inner.insert(key, value.clone()).await;
        value
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn entries_are_served_until_invalidated() {
        let cache = AnalyticsCache::new(Duration::from_secs(60));
        cache
            .insert("Events.getCategory:1".to_string(), json!([{ "nb_events": 3 }]))
            .await;

        let hit = cache.get("Events.getCategory:1").await.unwrap();
        assert_eq!(hit[0]["nb_events"], 3);
        assert_eq!(cache.entry_count().await, 1);

        cache.invalidate_all();
        assert!(cache.get("Events.getCategory:1").await.is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = AnalyticsCache::new(Duration::from_millis(50));
        cache.insert("k".to_string(), json!(1)).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.get("k").await.is_none());
    }
}
