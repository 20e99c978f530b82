//! Bounded store for analysis results pushed back by the relay.
//!
//! Least-recently-used eviction at capacity, plus a time-to-live after which
//! an entry reads as absent. Expired entries are dropped lazily on access.

use super::TransactionAnalysis;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

struct Entry {
    value: TransactionAnalysis,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
    /// Position in the recency order
    tick: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// tick -> key, oldest first
    recency: BTreeMap<u64, String>,
    next_tick: u64,
}

impl Inner {
    fn touch(&mut self, key: &str) {
        let tick = self.next_tick;
        self.next_tick += 1;
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.tick);
            entry.tick = tick;
            self.recency.insert(tick, key.to_string());
        }
    }

    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.tick);
        Some(entry)
    }

    fn evict_oldest(&mut self) {
        if let Some((_, key)) = self.recency.pop_first() {
            self.entries.remove(&key);
            tracing::debug!("Evicted analysis for {}", key);
        }
    }
}

pub struct AnalysisCache {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<Inner>,
}

/// Hashes are hex, compare case-insensitively
fn normalize(tx_hash: &str) -> String {
    tx_hash.trim().to_lowercase()
}

impl AnalysisCache {
    /// A zero capacity is treated as one
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live and not yet purged entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn put(&self, tx_hash: &str, value: TransactionAnalysis) {
        self.put_at(tx_hash, value, Instant::now());
    }

    pub fn get(&self, tx_hash: &str) -> Option<TransactionAnalysis> {
        self.get_at(tx_hash, Instant::now())
    }

    fn put_at(&self, tx_hash: &str, value: TransactionAnalysis, now: Instant) {
        let key = normalize(tx_hash);
        let mut inner = self.inner.lock();

        if inner.remove(&key).is_none() && inner.entries.len() >= self.capacity {
            inner.evict_oldest();
        }

        let tick = inner.next_tick;
        inner.next_tick += 1;
        inner.recency.insert(tick, key.clone());
        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at: now.checked_add(self.ttl),
                tick,
            },
        );
    }

    fn get_at(&self, tx_hash: &str, now: Instant) -> Option<TransactionAnalysis> {
        let key = normalize(tx_hash);
        let mut inner = self.inner.lock();

        let expired = matches!(inner.entries.get(&key)?.expires_at, Some(at) if now >= at);
        if expired {
            inner.remove(&key);
            return None;
        }

        inner.touch(&key);
        inner.entries.get(&key).map(|e| e.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn analysis(text: &str) -> TransactionAnalysis {
        TransactionAnalysis {
            analysis: text.to_string(),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_put_get() {
        let cache = AnalysisCache::new(4, Duration::from_secs(60));
        cache.put("0xAB", analysis("first"));

        assert_eq!(cache.get("0xab").unwrap().analysis, "first");
        assert_eq!(cache.get("0xAB").unwrap().analysis, "first");
        assert!(cache.get("0xcd").is_none());
    }

    #[test]
    fn test_put_replaces() {
        let cache = AnalysisCache::new(2, Duration::from_secs(60));
        cache.put("0x1", analysis("old"));
        cache.put("0x1", analysis("new"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("0x1").unwrap().analysis, "new");
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = AnalysisCache::new(2, Duration::from_secs(60));
        cache.put("0x1", analysis("a"));
        cache.put("0x2", analysis("b"));

        // reading 0x1 makes 0x2 the eviction candidate
        assert!(cache.get("0x1").is_some());
        cache.put("0x3", analysis("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("0x2").is_none());
        assert!(cache.get("0x1").is_some());
        assert!(cache.get("0x3").is_some());
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let cache = AnalysisCache::new(4, Duration::from_secs(u64::MAX));
        let start = Instant::now();
        cache.put_at("0x1", analysis("a"), start);

        assert_eq!(cache.get_at("0x1", start + Duration::from_secs(86_400 * 365)).unwrap().analysis, "a");
        cache.put("0x2", analysis("b"));
        assert!(cache.get("0x2").is_some());
    }

    #[test]
    fn test_entries_expire() {
        let cache = AnalysisCache::new(4, Duration::from_secs(10));
        let start = Instant::now();
        cache.put_at("0x1", analysis("a"), start);

        assert!(cache.get_at("0x1", start + Duration::from_secs(9)).is_some());
        assert!(cache.get_at("0x1", start + Duration::from_secs(10)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let cache = AnalysisCache::new(0, Duration::from_secs(60));
        cache.put("0x1", analysis("a"));
        cache.put("0x2", analysis("b"));
        assert_eq!(cache.capacity(), 1);
        assert!(cache.get("0x1").is_none());
        assert!(cache.get("0x2").is_some());
    }

    #[test]
    fn test_concurrent_access_stays_bounded() {
        let cache = Arc::new(AnalysisCache::new(16, Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("0x{t}{i}");
                        cache.put(&key, analysis("x"));
                        cache.get(&key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 16);
    }
}
