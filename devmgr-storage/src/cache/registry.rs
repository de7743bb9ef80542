//! Cache region registry.
//!
//! The registry is built once at process start from a backend and the full
//! set of region names, then shared by `Arc` with every entity service. There
//! is no implicit discovery: asking for a region that was never declared is
//! an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use devmgr_core::CacheError;
use serde::{de::DeserializeOwned, Serialize};

use super::traits::{CacheBackend, CachedRecord};

/// Lookup dimension of a cache region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Keyed by record id.
    Id,
    /// Keyed by natural key.
    Name,
    /// Keyed by filter + pagination signature.
    List,
    /// Keyed by dictionary grouping.
    Dic,
}

impl RegionKind {
    pub const ALL: [RegionKind; 4] = [
        RegionKind::Id,
        RegionKind::Name,
        RegionKind::List,
        RegionKind::Dic,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            RegionKind::Id => "id",
            RegionKind::Name => "name",
            RegionKind::List => "list",
            RegionKind::Dic => "dic",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Names of the four regions belonging to one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRegions {
    prefix: String,
}

impl EntityRegions {
    /// Regions for `entity` under `namespace`, e.g. `devmgr:driver_attribute:id`.
    pub fn new(namespace: &str, entity: &str) -> Self {
        Self {
            prefix: format!("{}:{}", namespace, entity),
        }
    }

    /// Regions for a cacheable record type.
    pub fn of<R: CachedRecord>(namespace: &str) -> Self {
        Self::new(namespace, R::entity_name())
    }

    /// Full region name for a lookup dimension.
    pub fn name(&self, kind: RegionKind) -> String {
        format!("{}:{}", self.prefix, kind.suffix())
    }

    /// All four region names.
    pub fn names(&self) -> impl Iterator<Item = String> + '_ {
        RegionKind::ALL.into_iter().map(move |kind| self.name(kind))
    }
}

/// Handle to one named region.
///
/// Values are stored as JSON so any serde type can be cached.
#[derive(Clone)]
pub struct CacheRegion {
    name: Arc<str>,
    backend: Arc<dyn CacheBackend>,
}

impl fmt::Debug for CacheRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegion").field("name", &self.name).finish()
    }
}

impl CacheRegion {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get and decode a value.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(bytes) = self.backend.get(&self.name, key).await? else {
            tracing::debug!(region = %self.name, key, "cache miss");
            return Ok(None);
        };
        tracing::debug!(region = %self.name, key, "cache hit");
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Serialization {
                region: self.name.to_string(),
                reason: e.to_string(),
            })
    }

    /// Encode and store a value.
    pub async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
            region: self.name.to_string(),
            reason: e.to_string(),
        })?;
        self.backend.put(&self.name, key, bytes).await
    }

    pub async fn evict(&self, key: &str) -> Result<(), CacheError> {
        self.backend.evict(&self.name, key).await
    }

    pub async fn evict_all(&self) -> Result<u64, CacheError> {
        self.backend.evict_all(&self.name).await
    }
}

/// Process-wide table of named cache regions.
pub struct CacheRegistry {
    backend: Arc<dyn CacheBackend>,
    regions: HashMap<String, CacheRegion>,
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.regions.keys().collect();
        names.sort();
        f.debug_struct("CacheRegistry").field("regions", &names).finish()
    }
}

impl CacheRegistry {
    /// Create a registry declaring the given regions.
    pub fn new<I, S>(backend: Arc<dyn CacheBackend>, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let regions = regions
            .into_iter()
            .map(|name| {
                let name: String = name.into();
                let region = CacheRegion {
                    name: Arc::from(name.as_str()),
                    backend: Arc::clone(&backend),
                };
                (name, region)
            })
            .collect();
        Self { backend, regions }
    }

    /// Create a registry declaring the four regions of each entity group.
    pub fn for_entities<'a>(
        backend: Arc<dyn CacheBackend>,
        entities: impl IntoIterator<Item = &'a EntityRegions>,
    ) -> Self {
        let names: Vec<String> = entities.into_iter().flat_map(|e| e.names()).collect();
        Self::new(backend, names)
    }

    /// Look up a declared region.
    pub fn region(&self, name: &str) -> Result<CacheRegion, CacheError> {
        self.regions
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::UnknownRegion {
                region: name.to_string(),
            })
    }

    /// Whether a region name was declared.
    pub fn contains(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }

    /// The shared backend.
    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory_backend::InMemoryCacheBackend;
    use devmgr_core::DriverAttribute;

    fn registry() -> (Arc<InMemoryCacheBackend>, CacheRegistry, EntityRegions) {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let regions = EntityRegions::of::<DriverAttribute>("test");
        let registry = CacheRegistry::for_entities(backend.clone(), [&regions]);
        (backend, registry, regions)
    }

    #[test]
    fn test_region_names() {
        let regions = EntityRegions::of::<DriverAttribute>("devmgr");
        assert_eq!(regions.name(RegionKind::Id), "devmgr:driver_attribute:id");
        assert_eq!(regions.name(RegionKind::Dic), "devmgr:driver_attribute:dic");
        assert_eq!(regions.names().count(), 4);
    }

    #[test]
    fn test_unknown_region_is_rejected() {
        let (_, registry, _) = registry();
        let err = registry.region("test:device:id").unwrap_err();
        assert_eq!(
            err,
            CacheError::UnknownRegion {
                region: "test:device:id".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_typed_round_trip_and_region_isolation() {
        let (backend, registry, regions) = registry();
        let id_region = registry.region(&regions.name(RegionKind::Id)).unwrap();
        let name_region = registry.region(&regions.name(RegionKind::Name)).unwrap();

        let attribute = DriverAttribute::new("temp", "Temperature", "float", 5);
        id_region.put("1", &attribute).await.unwrap();

        let cached: Option<DriverAttribute> = id_region.get("1").await.unwrap();
        assert_eq!(cached, Some(attribute));
        let other: Option<DriverAttribute> = name_region.get("1").await.unwrap();
        assert_eq!(other, None);

        id_region.evict("1").await.unwrap();
        assert_eq!(backend.region_len(id_region.name()), 0);
    }

    #[tokio::test]
    async fn test_undecodable_value_is_serialization_error() {
        let (backend, registry, regions) = registry();
        let name = regions.name(RegionKind::Id);
        backend.put(&name, "1", b"not json".to_vec()).await.unwrap();

        let region = registry.region(&name).unwrap();
        let err = region.get::<DriverAttribute>("1").await.unwrap_err();
        assert!(matches!(err, CacheError::Serialization { .. }));
    }
}
