use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::config::SyncConfig;
use crate::types::{AlignmentResult, AudioBuffer, DocumentId, Speed, VoiceId};

pub mod memory;
pub mod persistent;

use memory::MemoryTier;
use persistent::{FileStore, PersistentStore};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub document_id: DocumentId,
    pub unit_index: usize,
    pub voice: VoiceId,
    pub speed: Speed,
}

impl CacheKey {
    pub fn new(document_id: DocumentId, unit_index: usize, voice: VoiceId, speed: Speed) -> Self {
        Self {
            document_id,
            unit_index,
            voice,
            speed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub audio: Arc<AudioBuffer>,
    pub alignment: Option<Arc<AlignmentResult>>,
}

/// Point-in-time view of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Hits served by the persistent tier (also counted in `hits`).
    pub persistent_hits: u64,
    pub io_failures: u64,
    pub memory_entries: usize,
    pub memory_capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    persistent_hits: AtomicU64,
    io_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Two-tier alignment cache: bounded LRU memory in front of an optional
/// persistent store, written through on insert.
///
/// Persistent failures are logged and counted, never returned; the memory tier
/// alone is always a correct (if smaller) cache.
pub struct AlignmentCache {
    memory: MemoryTier,
    persistent: Option<Box<dyn PersistentStore>>,
    counters: Counters,
}

impl AlignmentCache {
    pub fn new(memory_capacity: NonZeroUsize, persistent: Option<Box<dyn PersistentStore>>) -> Self {
        Self {
            memory: MemoryTier::new(memory_capacity),
            persistent,
            counters: Counters::default(),
        }
    }

    pub fn in_memory(memory_capacity: NonZeroUsize) -> Self {
        Self::new(memory_capacity, None)
    }

    /// Memory tier sized by `memory_capacity`, files under `cache_root`.
    pub fn from_config(config: &SyncConfig) -> Self {
        let capacity = NonZeroUsize::new(config.memory_capacity).unwrap_or(NonZeroUsize::MIN);
        Self::new(
            capacity,
            Some(Box::new(FileStore::new(config.cache_root.clone()))),
        )
    }

    pub fn has_persistent_tier(&self) -> bool {
        self.persistent.is_some()
    }

    /// True when `key` is resident in memory. Counts nothing and leaves the
    /// LRU order untouched.
    pub fn contains_memory(&self, key: &CacheKey) -> bool {
        self.memory.contains(key)
    }

    /// Memory tier only. Never blocks on IO.
    pub fn get_memory(&self, key: &CacheKey) -> Option<CacheEntry> {
        let hit = self.memory.get(key);
        if hit.is_some() {
            Counters::bump(&self.counters.hits);
        }
        hit
    }

    /// Memory, then persistent (promoting a hit into memory). May block on IO.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        if let Some(entry) = self.memory.get(key) {
            Counters::bump(&self.counters.hits);
            return Some(entry);
        }

        if let Some(store) = &self.persistent {
            match store.load(key) {
                Ok(Some(entry)) => {
                    Counters::bump(&self.counters.hits);
                    Counters::bump(&self.counters.persistent_hits);
                    tracing::debug!(
                        document = %key.document_id,
                        unit_index = key.unit_index,
                        "cache: persistent hit promoted to memory"
                    );
                    self.put_memory(key.clone(), entry.clone());
                    return Some(entry);
                }
                Ok(None) => {}
                Err(err) => {
                    Counters::bump(&self.counters.io_failures);
                    tracing::warn!(
                        document = %key.document_id,
                        unit_index = key.unit_index,
                        error = %err,
                        "cache: persistent read failed; treating as miss"
                    );
                }
            }
        }

        Counters::bump(&self.counters.misses);
        None
    }

    /// Write-through insert. Entries without an alignment stay in memory only.
    pub fn insert(&self, key: CacheKey, entry: CacheEntry) {
        if let (Some(store), Some(alignment)) = (&self.persistent, &entry.alignment) {
            if let Err(err) = store.store(&key, &entry.audio, alignment) {
                Counters::bump(&self.counters.io_failures);
                tracing::warn!(
                    document = %key.document_id,
                    unit_index = key.unit_index,
                    error = %err,
                    "cache: persistent write failed; entry kept in memory only"
                );
            }
        }
        self.put_memory(key, entry);
    }

    pub fn invalidate_document(&self, document_id: &DocumentId) {
        let removed = self.memory.remove_document(document_id);
        if let Some(store) = &self.persistent {
            if let Err(err) = store.remove_document(document_id) {
                Counters::bump(&self.counters.io_failures);
                tracing::warn!(
                    document = %document_id,
                    error = %err,
                    "cache: persistent invalidation failed"
                );
            }
        }
        tracing::info!(document = %document_id, removed, "cache: document invalidated");
    }

    /// Drops a document's memory entries; its persistent records are kept.
    pub fn release_document(&self, document_id: &DocumentId) {
        let removed = self.memory.remove_document(document_id);
        tracing::debug!(document = %document_id, removed, "cache: document released from memory");
    }

    pub fn invalidate_all(&self) {
        let removed = self.memory.clear();
        if let Some(store) = &self.persistent {
            if let Err(err) = store.clear() {
                Counters::bump(&self.counters.io_failures);
                tracing::warn!(error = %err, "cache: persistent clear failed");
            }
        }
        tracing::info!(removed, "cache: all entries invalidated");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            persistent_hits: self.counters.persistent_hits.load(Ordering::Relaxed),
            io_failures: self.counters.io_failures.load(Ordering::Relaxed),
            memory_entries: self.memory.len(),
            memory_capacity: self.memory.capacity(),
        }
    }

    fn put_memory(&self, key: CacheKey, entry: CacheEntry) {
        if let Some(evicted) = self.memory.put(key, entry) {
            Counters::bump(&self.counters.evictions);
            tracing::debug!(
                document = %evicted.document_id,
                unit_index = evicted.unit_index,
                "cache: evicted least recently used entry"
            );
        }
    }
}
