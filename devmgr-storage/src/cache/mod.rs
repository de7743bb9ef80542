//! Multi-region cache layer kept consistent with the record store.
//!
//! Every cacheable entity type owns four regions, one per lookup dimension:
//! by id, by natural key, by filter + page signature and by dictionary
//! grouping. Reads go through [`read_through`] and are served from a region
//! whenever it holds the key. Writes go through the [`ConsistencyCoordinator`],
//! which populates or invalidates each region according to a fixed table
//! once the store has committed.
//!
//! # Staleness
//!
//! There is no TTL. A region entry stays valid until a write evicts it, so
//! all freshness comes from the write path. Writes that bypass the
//! coordinator leave regions stale until the next coordinated write to the
//! same entity type.
//!
//! # Example
//!
//! ```ignore
//! let backend = Arc::new(InMemoryCacheBackend::new());
//! let regions = EntityRegions::of::<DriverAttribute>("devmgr");
//! let registry = Arc::new(CacheRegistry::for_entities(backend, [&regions]));
//!
//! let coordinator = ConsistencyCoordinator::new(registry, regions);
//! let committed = coordinator
//!     .around(WriteOp::Delete, &store, async {
//!         let rows = store.delete_by_id(id).await?;
//!         Ok(Written::removed(rows, id))
//!     })
//!     .await?;
//! ```

pub mod coordinator;
pub mod memory_backend;
pub mod read_through;
pub mod registry;
pub mod traits;

pub use coordinator::{
    CacheStep, Committed, ConsistencyCoordinator, EffectKind, EffectPlan, EffectReport,
    RegionEffect, WriteOp, Written,
};
pub use memory_backend::InMemoryCacheBackend;
pub use read_through::{read_through, CacheRead, ReadSource};
pub use registry::{CacheRegion, CacheRegistry, EntityRegions, RegionKind};
pub use traits::{CacheBackend, CacheStats, CachedRecord};
