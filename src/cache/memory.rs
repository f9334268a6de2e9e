use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use super::{CacheEntry, CacheKey};
use crate::types::DocumentId;

/// Bounded in-memory tier; least recently used entries are evicted first.
pub struct MemoryTier {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
}

impl MemoryTier {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Looks up `key` and marks it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().contains(key)
    }

    /// Inserts or replaces `key`. Returns the key evicted to make room, if any.
    pub fn put(&self, key: CacheKey, entry: CacheEntry) -> Option<CacheKey> {
        let mut entries = self.entries.lock();
        match entries.push(key.clone(), entry) {
            Some((old_key, _)) if old_key != key => Some(old_key),
            _ => None,
        }
    }

    /// Drops every entry of `document_id`; returns how many were removed.
    pub fn remove_document(&self, document_id: &DocumentId) -> usize {
        let mut entries = self.entries.lock();
        let doomed: Vec<CacheKey> = entries
            .iter()
            .filter(|(k, _)| &k.document_id == document_id)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::{AudioBuffer, Speed, VoiceId};

    fn key(doc: &str, unit: usize) -> CacheKey {
        CacheKey::new(DocumentId::new(doc), unit, VoiceId::new("v"), Speed::NORMAL)
    }

    fn entry() -> CacheEntry {
        CacheEntry {
            audio: Arc::new(AudioBuffer {
                samples: vec![0.0; 4],
                sample_rate_hz: 8_000,
            }),
            alignment: None,
        }
    }

    #[test]
    fn evicts_least_recently_used() {
        let tier = MemoryTier::new(NonZeroUsize::new(2).unwrap());
        assert!(tier.put(key("d", 0), entry()).is_none());
        assert!(tier.put(key("d", 1), entry()).is_none());
        assert!(tier.get(&key("d", 0)).is_some());
        let evicted = tier.put(key("d", 2), entry());
        assert_eq!(evicted, Some(key("d", 1)));
        assert!(tier.contains(&key("d", 0)));
        assert!(!tier.contains(&key("d", 1)));
    }

    #[test]
    fn replacing_a_key_is_not_an_eviction() {
        let tier = MemoryTier::new(NonZeroUsize::new(1).unwrap());
        tier.put(key("d", 0), entry());
        assert!(tier.put(key("d", 0), entry()).is_none());
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn remove_document_keeps_other_documents() {
        let tier = MemoryTier::new(NonZeroUsize::new(8).unwrap());
        tier.put(key("a", 0), entry());
        tier.put(key("a", 1), entry());
        tier.put(key("b", 0), entry());
        assert_eq!(tier.remove_document(&DocumentId::new("a")), 2);
        assert_eq!(tier.len(), 1);
        assert!(tier.contains(&key("b", 0)));
        assert_eq!(tier.clear(), 1);
        assert!(tier.is_empty());
    }
}
