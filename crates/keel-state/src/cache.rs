//! PersisterCache — process-local read-through/write-through cache.
//!
//! The backing persister stays the only durable authority. Reads populate
//! the cache on a miss (a `NotFound` is never cached), writes and deletes
//! reach the backing store before the cache is touched. One lock per cache
//! instance is held across each backing call so a late read can never
//! overwrite a newer write. That includes retry backoff in the backing
//! persister: while one path waits out a transient failure (up to 7 s with
//! the default policy), every other caller of the same cache waits too.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::PersisterResult;
use crate::path;
use crate::persister::Persister;

/// Hit/miss counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct PersisterCache<P> {
    inner: P,
    entries: Mutex<HashMap<String, Vec<u8>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P: Persister> PersisterCache<P> {
    /// Wrap a persister. The cache always starts empty.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P: Persister> Persister for PersisterCache<P> {
    fn get(&self, path: &str) -> PersisterResult<Vec<u8>> {
        let key = path::normalize(path)?;
        let mut entries = self.lock();
        if let Some(bytes) = entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(bytes.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let bytes = self.inner.get(&key)?;
        entries.insert(key.clone(), bytes.clone());
        debug!(path = %key, "persister cache populated");
        Ok(bytes)
    }

    fn set(&self, path: &str, bytes: &[u8]) -> PersisterResult<()> {
        let key = path::normalize(path)?;
        let mut entries = self.lock();
        self.inner.set(&key, bytes)?;
        entries.insert(key, bytes.to_vec());
        Ok(())
    }

    fn delete(&self, path: &str) -> PersisterResult<()> {
        let key = path::normalize(path)?;
        let mut entries = self.lock();
        self.inner.delete(&key)?;
        entries.retain(|cached, _| !path::is_within(cached, &key));
        Ok(())
    }

    fn children(&self, path: &str) -> PersisterResult<Vec<String>> {
        self.inner.children(path)
    }
}
