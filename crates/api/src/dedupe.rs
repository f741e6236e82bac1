//! In-memory TTL dedupe for re-delivered updates and photo albums.
//!
//! Telegram may deliver the same update more than once, and an album
//! arrives as one message per photo sharing a media_group_id. The ledger
//! is idempotent regardless; this cache only keeps the caption pipeline
//! from commenting on the same post or album twice.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// Expired entries are swept lazily once the map grows past this.
const PRUNE_THRESHOLD: usize = 1024;

pub struct DedupeCache<K> {
    ttl: Duration,
    seen: Mutex<HashMap<K, Instant>>,
}

impl<K: Eq + Hash> DedupeCache<K> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// True exactly once per key within the TTL.
    pub fn first_sighting(&self, key: K) -> bool {
        let mut seen = self.seen.lock().expect("dedupe lock");
        let now = Instant::now();

        if seen.len() > PRUNE_THRESHOLD {
            let ttl = self.ttl;
            seen.retain(|_, stamp| now.duration_since(*stamp) <= ttl);
        }

        match seen.get(&key) {
            Some(stamp) if now.duration_since(*stamp) <= self.ttl => false,
            _ => {
                seen.insert(key, now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sighting_then_duplicate() {
        let cache = DedupeCache::new(Duration::from_secs(60));
        assert!(cache.first_sighting((1_i64, 2_i64)));
        assert!(!cache.first_sighting((1_i64, 2_i64)));
        assert!(cache.first_sighting((1_i64, 3_i64)));
    }

    #[test]
    fn test_expired_key_counts_as_new() {
        let cache = DedupeCache::new(Duration::ZERO);
        assert!(cache.first_sighting("album-1".to_string()));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.first_sighting("album-1".to_string()));
    }
}
