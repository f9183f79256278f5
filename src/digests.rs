use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use lru::LruCache;

use crate::fingerprint::Digest;

/// Bounded, least-recently-used map from relative file path to digest.
///
/// All access goes through a single lock, so a reader never sees a
/// half-finished insert or eviction.
pub struct Digests(Mutex<LruCache<String, Digest>>);

impl Digests {
    pub fn new(max: usize) -> Result<Self> {
        let max: NonZeroUsize = max.try_into()?;
        Ok(Digests(Mutex::new(LruCache::new(max))))
    }

    /// Looks up `key` and marks it most-recently-used on a hit.
    pub fn get(&self, key: &str) -> Option<Digest> {
        self.lock().get(key).copied()
    }

    /// Inserts or overwrites `key`, marking it most-recently-used.
    ///
    /// Returns the key that was evicted to make room, if any.
    pub fn put(&self, key: impl Into<String>, digest: Digest) -> Option<String> {
        let key = key.into();
        let mut cache = self.lock();
        match cache.push(key, digest) {
            // `push` hands back the previous pair when the key was already present
            Some((old, _)) if !cache.contains(&old) => Some(old),
            _ => None,
        }
    }

    /// Checks for `key` without touching its recency.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Digest>> {
        // nothing panics while the lock is held, so the contents are always whole
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(b: u8) -> Digest {
        [b; crate::HASH_LENGTH]
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        assert!(Digests::new(0).is_err());
    }

    #[test]
    fn test_get_missing() {
        let digests = Digests::new(2).unwrap();
        assert_eq!(digests.get("a.txt"), None);
        assert!(digests.is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let digests = Digests::new(2).unwrap();
        assert_eq!(digests.put("a.txt", digest(1)), None);
        assert_eq!(digests.get("a.txt"), Some(digest(1)));
        assert_eq!(digests.len(), 1);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let digests = Digests::new(2).unwrap();
        digests.put("a.txt", digest(1));
        assert_eq!(digests.put("a.txt", digest(2)), None);
        assert_eq!(digests.len(), 1);
        assert_eq!(digests.get("a.txt"), Some(digest(2)));
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let digests = Digests::new(5).unwrap();
        for i in 0..50u8 {
            digests.put(format!("file-{}", i % 13), digest(i));
            assert!(digests.len() <= 5);
        }
        assert_eq!(digests.len(), 5);
        assert_eq!(digests.capacity(), 5);
    }

    #[test]
    fn test_first_inserted_is_evicted() {
        let digests = Digests::new(3).unwrap();
        assert_eq!(digests.put("a", digest(1)), None);
        assert_eq!(digests.put("b", digest(2)), None);
        assert_eq!(digests.put("c", digest(3)), None);
        assert_eq!(digests.put("d", digest(4)), Some("a".to_string()));

        assert!(!digests.contains("a"));
        assert!(digests.contains("b"));
        assert!(digests.contains("c"));
        assert!(digests.contains("d"));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let digests = Digests::new(3).unwrap();
        digests.put("k", digest(0));
        digests.put("a", digest(1));
        digests.put("b", digest(2));

        assert!(digests.get("k").is_some());

        assert_eq!(digests.put("c", digest(3)), Some("a".to_string()));
        assert_eq!(digests.put("d", digest(4)), Some("b".to_string()));
        assert!(digests.contains("k"));
        assert_eq!(digests.put("e", digest(5)), Some("k".to_string()));
    }

    #[test]
    fn test_oldest_survives_after_get() {
        let n = 6;
        let digests = Digests::new(n).unwrap();
        digests.put("k", digest(99));
        for i in 1..n {
            digests.put(format!("old-{i}"), digest(i as u8));
        }
        assert!(digests.get("k").is_some());

        for i in 1..n {
            assert_eq!(
                digests.put(format!("new-{i}"), digest(i as u8)),
                Some(format!("old-{i}"))
            );
        }
        assert!(digests.contains("k"));
        assert_eq!(digests.put("one-more", digest(0)), Some("k".to_string()));
    }

    #[test]
    fn test_put_refreshes_recency() {
        let digests = Digests::new(2).unwrap();
        digests.put("a", digest(1));
        digests.put("b", digest(2));
        digests.put("a", digest(3));
        assert_eq!(digests.put("c", digest(4)), Some("b".to_string()));
        assert_eq!(digests.get("a"), Some(digest(3)));
    }

    #[test]
    fn test_contains_does_not_refresh() {
        let digests = Digests::new(2).unwrap();
        digests.put("a", digest(1));
        digests.put("b", digest(2));
        assert!(digests.contains("a"));
        assert_eq!(digests.put("c", digest(3)), Some("a".to_string()));
    }

    #[test]
    fn test_concurrent_puts_respect_capacity() {
        let digests = std::sync::Arc::new(Digests::new(8).unwrap());
        let handles: Vec<_> = (0..8u8)
            .map(|t| {
                let digests = digests.clone();
                std::thread::spawn(move || {
                    for i in 0..200u8 {
                        digests.put(format!("{t}-{}", i % 16), digest(i));
                        digests.get(&format!("{t}-{}", i % 7));
                        assert!(digests.len() <= 8);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(digests.len(), 8);
    }
}
