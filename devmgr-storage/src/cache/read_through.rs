//! Cache-aside reads.
//!
//! A hit is returned unconditionally: write-side invalidation is the only
//! freshness mechanism. On a miss the loader runs, and only a present result
//! is written back. Absent results are never cached, so a record created
//! right after a miss is visible to the next read.

use std::future::Future;

use devmgr_core::{CacheError, ManagerResult};
use serde::{de::DeserializeOwned, Serialize};

use super::registry::CacheRegion;

/// Where a read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    Cache,
    Store,
}

/// Result of a cache-aside read, carrying its source.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    value: T,
    source: ReadSource,
}

impl<T> CacheRead<T> {
    /// Create a new cache read from a cache hit.
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            source: ReadSource::Cache,
        }
    }

    /// Create a new cache read from a store fetch (cache miss).
    pub fn from_store(value: T) -> Self {
        Self {
            value,
            source: ReadSource::Store,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Get a reference to the underlying value.
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    pub fn was_cache_hit(&self) -> bool {
        self.source == ReadSource::Cache
    }

    pub fn was_cache_miss(&self) -> bool {
        self.source == ReadSource::Store
    }
}

/// Probe `region` at `key`, falling back to `load` on a miss.
///
/// Probe failures propagate as [`CacheError::Unavailable`]. An entry that no
/// longer decodes is evicted and treated as a miss. A failed write-back after
/// a successful load is logged and the loaded value is still returned.
pub async fn read_through<T, F, Fut>(
    region: &CacheRegion,
    key: &str,
    load: F,
) -> ManagerResult<Option<CacheRead<T>>>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = ManagerResult<Option<T>>>,
{
    match region.get::<T>(key).await {
        Ok(Some(hit)) => return Ok(Some(CacheRead::from_cache(hit))),
        Ok(None) => {}
        Err(CacheError::Serialization { reason, .. }) => {
            tracing::warn!(region = region.name(), key, %reason, "dropping undecodable cache entry");
            if let Err(e) = region.evict(key).await {
                tracing::warn!(region = region.name(), key, error = %e, "failed to evict undecodable entry");
            }
        }
        Err(e) => return Err(e.into()),
    }

    let Some(value) = load().await? else {
        return Ok(None);
    };

    if let Err(e) = region.put(key, &value).await {
        tracing::warn!(region = region.name(), key, error = %e, "cache populate after load failed");
    }
    Ok(Some(CacheRead::from_store(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory_backend::InMemoryCacheBackend;
    use crate::cache::registry::CacheRegistry;
    use crate::cache::traits::CacheBackend;
    use devmgr_core::ManagerError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn region() -> (Arc<InMemoryCacheBackend>, CacheRegion) {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let registry = CacheRegistry::new(backend.clone(), ["r"]);
        (backend, registry.region("r").unwrap())
    }

    #[tokio::test]
    async fn test_miss_loads_then_hit_skips_loader() {
        let (_, region) = region();
        let counter = AtomicUsize::new(0);
        let loads = &counter;
        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ManagerError>(Some("value".to_string()))
        };

        let first = read_through(&region, "k", load).await.unwrap().unwrap();
        assert!(first.was_cache_miss());

        let second = read_through(&region, "k", load).await.unwrap().unwrap();
        assert!(second.was_cache_hit());
        assert_eq!(second.into_value(), "value");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_absent_result_is_not_cached() {
        let (backend, region) = region();
        let result = read_through::<String, _, _>(&region, "k", || async { Ok::<_, ManagerError>(None) })
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(!backend.contains("r", "k"));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_replaced() {
        let (backend, region) = region();
        backend.put("r", "k", b"{broken".to_vec()).await.unwrap();

        let read = read_through(&region, "k", || async { Ok::<_, ManagerError>(Some(7u32)) })
            .await
            .unwrap()
            .unwrap();
        assert!(read.was_cache_miss());
        assert_eq!(region.get::<u32>("k").await.unwrap(), Some(7));
    }
}
