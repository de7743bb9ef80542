//! Cache backend traits and cacheable record marker.
//!
//! This module defines the traits that must be implemented by cache backends
//! and records that can be cached.

use async_trait::async_trait;
use devmgr_core::{CacheError, DriverAttribute, NaturalKey, Record, RecordId};
use serde::{de::DeserializeOwned, Serialize};

/// Marker trait for records that can be cached.
///
/// Provides the entity name used to derive region names and the key
/// derivation for the id and natural-key regions. Both keys must be derivable
/// from the record alone so write paths can populate without extra reads.
pub trait CachedRecord: Record + Serialize + DeserializeOwned {
    /// Entity name used as the region prefix, e.g. `driver_attribute`.
    fn entity_name() -> &'static str;

    /// Key in the ID region.
    fn id_key(id: RecordId) -> String {
        id.to_string()
    }

    /// Key in the NAME region.
    fn name_key(key: &NaturalKey) -> String {
        key.to_string()
    }
}

impl CachedRecord for DriverAttribute {
    fn entity_name() -> &'static str {
        "driver_attribute"
    }
}

/// Cache backend trait for pluggable cache implementations.
///
/// Backends hold many independent regions, each a key → bytes map. Every
/// call is atomic within its region only; there is no cross-region
/// transaction. A missing key is a normal outcome, not an error.
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a value from a region.
    async fn get(&self, region: &str, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Put a value into a region, replacing any previous value.
    async fn put(&self, region: &str, key: &str, value: Vec<u8>) -> Result<(), CacheError>;

    /// Remove a single key from a region.
    async fn evict(&self, region: &str, key: &str) -> Result<(), CacheError>;

    /// Remove every key in a region. Returns the number of entries removed.
    async fn evict_all(&self, region: &str) -> Result<u64, CacheError>;

    /// Get cache statistics.
    async fn stats(&self) -> Result<CacheStats, CacheError>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of entries removed by evict or evict-all.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
