//! Short-lived, credential-keyed cache for merged feeds.
//!
//! Each credential maps to one slot. A slot holds a `tokio::sync::OnceCell`,
//! so concurrent requests for the same credential share a single build while
//! requests for other credentials build in parallel. Slots whose build is
//! still running sit outside the LRU and cannot be evicted; a finished slot
//! moves into the LRU. Values expire `ttl` after they were built; failed or
//! cancelled builds leave nothing behind so the next request simply tries
//! again.
//!
//! Credentials are never stored: keys are SHA-256 digests, and only the first
//! eight hex characters (the fingerprint) ever reach the logs.

use lru::LruCache;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;

/// Matches the refresh interval the public feed advertises.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
/// Maximum number of distinct credentials kept at once.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// SHA-256 digest of a credential, hex encoded.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_credential(credential: &str) -> Self {
        let digest = Sha256::digest(credential.as_bytes());
        Self(format!("{:x}", digest))
    }

    /// Short prefix of the digest, safe to log.
    pub fn fingerprint(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fingerprint())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.fingerprint())
    }
}

struct Slot<V> {
    cell: OnceCell<(Arc<V>, Instant)>,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cell
            .get()
            .is_some_and(|(_, built_at)| built_at.elapsed() >= ttl)
    }
}

struct Slots<V> {
    /// Finished builds, subject to LRU eviction.
    ready: LruCache<CacheKey, Arc<Slot<V>>>,
    /// Builds still in flight.
    building: HashMap<CacheKey, Building<V>>,
}

struct Building<V> {
    slot: Arc<Slot<V>>,
    /// Callers holding a [`Pending`] handle on `slot`.
    callers: usize,
}

/// A caller's handle on a slot. Dropping it settles the slot, whether the
/// build finished, failed or was cancelled.
struct Pending<'a, V> {
    cache: &'a FeedCache<V>,
    key: CacheKey,
    slot: Arc<Slot<V>>,
}

impl<V> Drop for Pending<'_, V> {
    fn drop(&mut self) {
        self.cache.settle(&self.key, &self.slot);
    }
}

/// TTL + LRU cache with single-flight builds per key.
pub struct FeedCache<V> {
    ttl: Duration,
    slots: Mutex<Slots<V>>,
}

impl<V> FeedCache<V> {
    pub fn new(ttl: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            ttl,
            slots: Mutex::new(Slots {
                ready: LruCache::new(capacity),
                building: HashMap::new(),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of resident slots, including ones whose value has expired or
    /// whose build has not finished yet.
    pub fn len(&self) -> usize {
        let slots = self.lock();
        slots.ready.len() + slots.building.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached value for `credential`, running `build` on a miss.
    ///
    /// - A value built less than `ttl` ago is returned without calling `build`.
    /// - Concurrent callers with the same credential wait for one shared build,
    ///   even if other credentials push it out of the LRU meanwhile.
    /// - If `build` fails, nothing is stored and the error is returned; a
    ///   caller that was waiting on the same key then runs its own build.
    pub async fn get_or_build<F, Fut, E>(&self, credential: &str, build: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let pending = self.slot_for(CacheKey::for_credential(credential));
        let fingerprint = pending.key.fingerprint();

        let (value, _) = pending
            .slot
            .cell
            .get_or_try_init(|| async move {
                tracing::debug!(key = %fingerprint, "Cache miss, building merged feed");
                let value = build().await?;
                Ok::<_, E>((Arc::new(value), Instant::now()))
            })
            .await?;

        Ok(Arc::clone(value))
    }

    /// Finds the live slot for `key`: a fresh finished one, else the one being
    /// built, else a new one.
    fn slot_for(&self, key: CacheKey) -> Pending<'_, V> {
        let mut slots = self.lock();

        if let Some(slot) = slots.ready.get(&key) {
            if !slot.is_expired(self.ttl) {
                let slot = Arc::clone(slot);
                drop(slots);
                return Pending {
                    cache: self,
                    key,
                    slot,
                };
            }
            tracing::debug!(key = %key, "Cached feed expired");
            slots.ready.pop(&key);
        }

        let building = slots
            .building
            .entry(key.clone())
            .or_insert_with(|| Building {
                slot: Arc::new(Slot::new()),
                callers: 0,
            });
        building.callers += 1;
        let slot = Arc::clone(&building.slot);
        drop(slots);
        Pending {
            cache: self,
            key,
            slot,
        }
    }

    /// Moves a finished build into the LRU, or forgets an abandoned one once
    /// no caller is left waiting on it.
    fn settle(&self, key: &CacheKey, slot: &Arc<Slot<V>>) {
        let mut slots = self.lock();

        let Some(building) = slots.building.get_mut(key) else {
            return;
        };
        if !Arc::ptr_eq(&building.slot, slot) {
            return;
        }
        building.callers -= 1;
        let callers = building.callers;

        if slot.cell.initialized() {
            slots.building.remove(key);
            if let Some((evicted, _)) = slots.ready.push(key.clone(), Arc::clone(slot)) {
                if evicted != *key {
                    tracing::debug!(key = %evicted, "Evicted least recently used feed");
                }
            }
        } else if callers == 0 {
            slots.building.remove(key);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<V>> {
        // No code panics while holding the lock; recover the map if it ever does.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V> fmt::Debug for FeedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedCache")
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .finish()
    }
}
