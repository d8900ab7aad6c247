//! Bounded hash cache with TTL and max-size eviction
//!
//! Remembers which burn transactions the watcher has already dispatched so
//! overlapping block ranges, restarts with `--from-block`, or transactions
//! carrying several Bridge logs do not start a second completion.
//!
//! Each entry is ~40 bytes (32-byte key + 8-byte Instant), so the default
//! 100k entries stay around 4 MB.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use alloy::primitives::B256;

pub const DEFAULT_DISPATCH_CACHE_SIZE: usize = 100_000;
pub const DEFAULT_DISPATCH_CACHE_TTL: Duration = Duration::from_secs(86_400); // 24 hours

/// Bounded set of 32-byte hashes
///
/// - **Max capacity:** when full, the oldest entry is evicted on insert.
/// - **TTL:** expired entries are dropped on insert and ignored on lookup.
pub struct BoundedHashCache {
    map: HashMap<B256, Instant>,
    max_size: usize,
    ttl: Duration,
}

impl Default for BoundedHashCache {
    fn default() -> Self {
        Self::new(DEFAULT_DISPATCH_CACHE_SIZE, DEFAULT_DISPATCH_CACHE_TTL)
    }
}

impl BoundedHashCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            map: HashMap::new(),
            max_size: max_size.max(1),
            ttl,
        }
    }

    pub fn contains(&self, hash: &B256) -> bool {
        self.map.get(hash).is_some_and(|&t| t.elapsed() < self.ttl)
    }

    /// Insert `hash`, returning `false` if a live entry was already present
    pub fn insert(&mut self, hash: B256) -> bool {
        if self.contains(&hash) {
            return false;
        }

        let now = Instant::now();
        self.map.retain(|_, &mut t| now.duration_since(t) < self.ttl);
        while self.map.len() >= self.max_size {
            let oldest = self.map.iter().min_by_key(|(_, t)| **t).map(|(h, _)| *h);
            match oldest {
                Some(h) => {
                    self.map.remove(&h);
                }
                None => break,
            }
        }
        self.map.insert(hash, now);
        true
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut cache = BoundedHashCache::new(10, Duration::from_secs(3600));
        let hash = B256::repeat_byte(1);
        assert!(!cache.contains(&hash));
        assert!(cache.insert(hash));
        assert!(cache.contains(&hash));
        assert!(!cache.insert(hash));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_oldest() {
        let mut cache = BoundedHashCache::new(3, Duration::from_secs(3600));
        for b in 1..=4u8 {
            cache.insert(B256::repeat_byte(b));
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(!cache.contains(&B256::repeat_byte(1)));
        assert!(cache.contains(&B256::repeat_byte(4)));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_expired_entry_can_be_reinserted() {
        let mut cache = BoundedHashCache::new(10, Duration::ZERO);
        let hash = B256::repeat_byte(7);
        assert!(cache.insert(hash));
        assert!(!cache.contains(&hash));
        assert!(cache.insert(hash));
        assert_eq!(cache.len(), 1);
    }
}
