// src/cache.rs

//! Short-TTL response cache for the history search view.
//!
//! Keys are canonicalized by sorting the query pairs, so parameter order
//! never splits the cache. Entries expire passively; an expired entry is
//! evicted on the read that finds it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Canonical cache key: path plus query pairs in lexicographic order.
pub fn canonical_key(path: &str, pairs: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort();
    let query: Vec<String> = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect();
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query.join("&"))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    expires_at: Instant,
}

/// In-memory TTL cache of serialized response bodies.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl ResponseCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }

    /// Look up a fresh entry, evicting it if expired.
    pub async fn get(&self, key: &str) -> Option<String> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.body.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        self.entries.write().await.remove(key);
        None
    }

    pub async fn put(&self, key: String, body: String) {
        let entry = CacheEntry {
            body,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(key, entry);
    }

    /// Populate the cache without delaying the response that produced the
    /// body.
    pub fn put_detached(&self, key: String, body: String) {
        let cache = self.clone();
        tokio::spawn(async move {
            cache.put(key, body).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(input: &[(&str, &str)]) -> Vec<(String, String)> {
        input
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_canonical_key_is_order_independent() {
        let a = canonical_key("/v1/history/search", &pairs(&[("q", "main"), ("days", "30")]));
        let b = canonical_key("/v1/history/search", &pairs(&[("days", "30"), ("q", "main")]));
        assert_eq!(a, b);
        assert_eq!(a, "/v1/history/search?days=30&q=main");
    }

    #[test]
    fn test_canonical_key_without_query() {
        assert_eq!(canonical_key("/v1/health", &[]), "/v1/health");
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = ResponseCache::new(60);
        cache.put("k".into(), "body".into()).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("body"));
        assert_eq!(cache.get("other").await, None);
    }

    #[tokio::test]
    async fn test_zero_ttl_entry_is_expired() {
        let cache = ResponseCache::new(0);
        cache.put("k".into(), "body".into()).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_put_detached_lands() {
        let cache = ResponseCache::new(60);
        cache.put_detached("k".into(), "body".into());
        // The spawned write races this read; yield until it lands.
        for _ in 0..100 {
            if cache.get("k").await.is_some() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("detached put never landed");
    }
}
