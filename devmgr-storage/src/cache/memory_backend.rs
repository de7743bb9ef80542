//! In-process cache backend.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use devmgr_core::CacheError;

use super::traits::{CacheBackend, CacheStats};

/// Concurrent in-memory backend: one map per region.
///
/// Per-key operations are atomic through the shard locks of the region map;
/// no lock is held across an `.await`.
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    regions: DashMap<String, DashMap<String, Vec<u8>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held in a region.
    pub fn region_len(&self, region: &str) -> usize {
        self.regions.get(region).map(|r| r.len()).unwrap_or(0)
    }

    /// Whether a region currently holds the key.
    pub fn contains(&self, region: &str, key: &str) -> bool {
        self.regions
            .get(region)
            .map(|r| r.contains_key(key))
            .unwrap_or(false)
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, region: &str, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let value = self
            .regions
            .get(region)
            .and_then(|r| r.get(key).map(|v| v.value().clone()));
        let counter = if value.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    async fn put(&self, region: &str, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        self.regions
            .entry(region.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn evict(&self, region: &str, key: &str) -> Result<(), CacheError> {
        let removed = self
            .regions
            .get(region)
            .and_then(|r| r.remove(key))
            .is_some();
        if removed {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn evict_all(&self, region: &str) -> Result<u64, CacheError> {
        let removed = match self.regions.get(region) {
            Some(r) => {
                let count = r.len() as u64;
                r.clear();
                count
            }
            None => 0,
        };
        self.evictions.fetch_add(removed, Ordering::Relaxed);
        Ok(removed)
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let entry_count = self.regions.iter().map(|r| r.len() as u64).sum();
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}
