//! Generic key -> value collection with an LRU read cache.
//!
//! [`CachedCollection`] is instantiated once per entity type whose access
//! pattern is point lookups by a single key (user profiles, rooms). Writes go
//! to SQLite first and only then to the cache; reads are served from the
//! cache when possible and read through to SQLite otherwise.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use rusqlite::Transaction;
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::Result;
use crate::lru::LruCache;
use crate::store::{Collection, Store, TxMode};

/// An entity stored in its own single-key collection.
///
/// `key` is the key-extraction function; the remaining methods map the
/// entity onto its table inside a caller-provided transaction.
pub trait CachedRecord: Clone + Send + Sync + 'static {
    type Key: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static;

    const COLLECTION: Collection;

    fn key(&self) -> Self::Key;

    fn upsert(tx: &Transaction<'_>, value: &Self) -> Result<()>;

    fn select(tx: &Transaction<'_>, key: &Self::Key) -> Result<Option<Self>>;

    fn select_all(tx: &Transaction<'_>) -> Result<Vec<Self>>;

    /// Returns `true` if a row was deleted.
    fn delete(tx: &Transaction<'_>, key: &Self::Key) -> Result<bool>;
}

// Private to one collection instance; never shared.
struct CacheState<K, V> {
    entries: LruCache<K, V>,
    // Bumped by every write or eviction. A read-through only populates the
    // cache if no write happened while it was reading.
    generation: u64,
}

impl<K, V> CacheState<K, V> {
    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

pub struct CachedCollection<R: CachedRecord> {
    store: Arc<Store>,
    cache: Mutex<CacheState<R::Key, R>>,
}

impl<R: CachedRecord> CachedCollection<R> {
    pub fn new(store: Arc<Store>, capacity: usize) -> Self {
        Self {
            store,
            cache: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                generation: 0,
            }),
        }
    }

    pub(crate) fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Fetch a record, from the cache if present, otherwise from storage.
    pub async fn get(&self, key: &R::Key) -> Result<Option<R>> {
        let generation = {
            let mut cache = self.cache.lock().await;
            if let Some(hit) = cache.entries.get(key) {
                trace!(collection = R::COLLECTION.table(), %key, "cache hit");
                return Ok(Some(hit.clone()));
            }
            cache.generation
        };

        let owned = key.clone();
        let found = self
            .store
            .run_transaction(&[R::COLLECTION], TxMode::ReadOnly, move |tx| {
                R::select(tx, &owned)
            })
            .await?;

        if let Some(value) = &found {
            let mut cache = self.cache.lock().await;
            // A put or remove that committed while we were reading makes
            // this value stale.
            if cache.generation == generation && !cache.entries.contains(key) {
                cache.entries.insert(key.clone(), value.clone());
            }
        }

        trace!(collection = R::COLLECTION.table(), %key, found = found.is_some(), "cache miss");
        Ok(found)
    }

    /// Write a record durably, then cache it.
    pub async fn put(&self, value: R) -> Result<()> {
        let stored = value.clone();
        self.store
            .run_transaction(&[R::COLLECTION], TxMode::ReadWrite, move |tx| {
                R::upsert(tx, &stored)
            })
            .await?;

        let mut cache = self.cache.lock().await;
        cache.bump();
        cache.entries.insert(value.key(), value);
        Ok(())
    }

    /// Write many records in one transaction, then cache them in order.
    pub async fn put_many(&self, values: Vec<R>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let values = Arc::new(values);
        let stored = Arc::clone(&values);
        self.store
            .run_transaction(&[R::COLLECTION], TxMode::ReadWrite, move |tx| {
                stored.iter().try_for_each(|value| R::upsert(tx, value))
            })
            .await?;

        let mut cache = self.cache.lock().await;
        cache.bump();
        for value in values.iter() {
            cache.entries.insert(value.key(), value.clone());
        }
        Ok(())
    }

    /// Every record in durable storage. Does not populate the cache.
    pub async fn get_all(&self) -> Result<Vec<R>> {
        self.store
            .run_transaction(&[R::COLLECTION], TxMode::ReadOnly, |tx| R::select_all(tx))
            .await
    }

    /// Delete a record durably, then drop it from the cache.
    pub async fn remove(&self, key: &R::Key) -> Result<bool> {
        let owned = key.clone();
        let removed = self
            .store
            .run_transaction(&[R::COLLECTION], TxMode::ReadWrite, move |tx| {
                R::delete(tx, &owned)
            })
            .await?;

        self.evict(key).await;
        Ok(removed)
    }

    /// Drop a cached entry without touching storage.
    pub(crate) async fn evict(&self, key: &R::Key) {
        let mut cache = self.cache.lock().await;
        cache.bump();
        cache.entries.remove(key);
    }

    /// Whether `key` is currently held in memory. Does not refresh recency.
    pub async fn is_cached(&self, key: &R::Key) -> bool {
        self.cache.lock().await.entries.contains(key)
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.entries.len()
    }
}
