//! Process-wide store of finished audio, keyed by opaque id.
//!
//! Entries are immutable once stored (`Arc<EncodedAudio>`), ids are never
//! reused.  Two bounds keep the store from growing without limit:
//! * at most `max_entries` entries; inserting into a full cache evicts the
//!   oldest insertion first,
//! * entries older than `ttl` are dropped on lookup and insert (`ttl` of
//!   zero disables expiry).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::audio::EncodedAudio;
use crate::config::CacheConfig;

struct Entry {
    audio: Arc<EncodedAudio>,
    inserted: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Uuid, Entry>,
    /// Insertion order, oldest first.
    order: VecDeque<Uuid>,
}

/// Keyed audio store shared by request handlers.
pub struct AudioCache {
    inner: Mutex<Inner>,
    max_entries: usize,
    ttl: Option<Duration>,
}

impl AudioCache {
    /// `max_entries` below 1 is treated as 1.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries: max_entries.max(1),
            ttl: (!ttl.is_zero()).then_some(ttl),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, Duration::from_secs(config.ttl_secs))
    }

    /// Store `audio` under a fresh id and return the id.
    pub fn insert(&self, audio: EncodedAudio) -> Uuid {
        self.insert_at(audio, Instant::now())
    }

    /// Look up `id`.  Expired entries are never returned.
    pub fn get(&self, id: &Uuid) -> Option<Arc<EncodedAudio>> {
        self.get_at(id, Instant::now())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert_at(&self, audio: EncodedAudio, now: Instant) -> Uuid {
        let mut inner = self.lock();
        self.purge_expired(&mut inner, now);

        while inner.entries.len() >= self.max_entries {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            log::debug!("cache: evicted {oldest}");
        }

        let mut id = Uuid::new_v4();
        while inner.entries.contains_key(&id) {
            id = Uuid::new_v4();
        }

        inner.entries.insert(
            id,
            Entry {
                audio: Arc::new(audio),
                inserted: now,
            },
        );
        inner.order.push_back(id);
        id
    }

    fn get_at(&self, id: &Uuid, now: Instant) -> Option<Arc<EncodedAudio>> {
        let mut inner = self.lock();
        self.purge_expired(&mut inner, now);
        inner.entries.get(id).map(|e| Arc::clone(&e.audio))
    }

    fn purge_expired(&self, inner: &mut Inner, now: Instant) {
        let Some(ttl) = self.ttl else {
            return;
        };

        // `order` is sorted by insertion time, so expired ids form a prefix.
        while let Some(oldest) = inner.order.front().copied() {
            let expired = inner
                .entries
                .get(&oldest)
                .map_or(true, |e| now.saturating_duration_since(e.inserted) >= ttl);
            if !expired {
                break;
            }
            inner.order.pop_front();
            inner.entries.remove(&oldest);
        }
    }
}

impl Default for AudioCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl std::fmt::Debug for AudioCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioCache")
            .field("len", &self.len())
            .field("max_entries", &self.max_entries)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AssembledAudio, WavEncoder};

    fn wav(n: usize) -> EncodedAudio {
        WavEncoder::new()
            .encode(&AssembledAudio::new(8_000, vec![0.0; n]))
            .unwrap()
    }

    #[test]
    fn insert_then_get() {
        let cache = AudioCache::new(4, Duration::from_secs(60));
        let id = cache.insert(wav(10));
        assert_eq!(cache.get(&id).unwrap().len(), 44 + 20);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unknown_id_misses() {
        let cache = AudioCache::default();
        assert!(cache.get(&Uuid::new_v4()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let cache = AudioCache::new(8, Duration::ZERO);
        let a = cache.insert(wav(1));
        let b = cache.insert(wav(1));
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn full_cache_evicts_oldest_first() {
        let cache = AudioCache::new(2, Duration::ZERO);
        let first = cache.insert(wav(1));
        let second = cache.insert(wav(2));
        let third = cache.insert(wav(3));

        assert!(cache.get(&first).is_none());
        assert!(cache.get(&second).is_some());
        assert!(cache.get(&third).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = AudioCache::new(8, Duration::from_secs(10));
        let start = Instant::now();
        let old = cache.insert_at(wav(1), start);
        let fresh = cache.insert_at(wav(1), start + Duration::from_secs(6));

        let later = start + Duration::from_secs(11);
        assert!(cache.get_at(&old, later).is_none());
        assert!(cache.get_at(&fresh, later).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_ttl_never_expires() {
        let cache = AudioCache::new(8, Duration::ZERO);
        let start = Instant::now();
        let id = cache.insert_at(wav(1), start);
        assert!(cache
            .get_at(&id, start + Duration::from_secs(86_400))
            .is_some());
    }

    #[test]
    fn stored_audio_is_shared_not_copied() {
        let cache = AudioCache::default();
        let id = cache.insert(wav(4));
        let a = cache.get(&id).unwrap();
        let b = cache.get(&id).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
