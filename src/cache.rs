//! Bounded, time-expiring response cache.
//!
//! Keyed by URL + query; purely an optimization so repeated identical
//! requests skip the fetch/embed/query pipeline. Never a correctness
//! dependency: a miss just re-runs the request.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::CacheConfig;
use crate::search::SearchResponse;

struct Entry {
    stored_at: Instant,
    response: SearchResponse,
}

/// Process-scoped TTL cache guarded by a mutex.
///
/// Constructed at startup and injected into the pipeline; when the capacity
/// is reached the oldest entry is evicted.
pub struct ResponseCache {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            capacity: config.capacity.max(1),
            ttl: config.ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache key for a request.
    pub fn key(url: &str, query: &str) -> String {
        format!("{url}:{query}")
    }

    /// Returns a clone of the cached response when present and fresh.
    pub fn get(&self, key: &str) -> Option<SearchResponse> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                Some(entry.response.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, response: SearchResponse) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
            if entries.len() >= self.capacity {
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                response,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(query: &str) -> SearchResponse {
        SearchResponse {
            results: Vec::new(),
            total_chunks: 7,
            query: query.to_string(),
        }
    }

    fn cache(capacity: usize, ttl: Duration) -> ResponseCache {
        ResponseCache::new(&CacheConfig { capacity, ttl })
    }

    #[test]
    fn round_trips_fresh_entries() {
        let cache = cache(10, Duration::from_secs(60));
        let key = ResponseCache::key("https://a.com", "rust");
        cache.insert(key.clone(), response("rust"));

        let hit = cache.get(&key).expect("fresh entry");
        assert_eq!(hit.total_chunks, 7);
        assert_eq!(hit.query, "rust");
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = cache(10, Duration::ZERO);
        let key = ResponseCache::key("https://a.com", "rust");
        cache.insert(key.clone(), response("rust"));

        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_oldest_entry() {
        let cache = cache(2, Duration::from_secs(60));
        cache.insert("first".to_string(), response("a"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("second".to_string(), response("b"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("third".to_string(), response("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("first").is_none(), "oldest entry evicted");
        assert!(cache.get("third").is_some());
    }

    #[test]
    fn key_includes_url_and_query() {
        assert_ne!(
            ResponseCache::key("https://a.com", "x"),
            ResponseCache::key("https://a.com", "y")
        );
        assert_ne!(
            ResponseCache::key("https://a.com", "x"),
            ResponseCache::key("https://b.com", "x")
        );
    }
}
