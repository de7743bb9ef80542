//! Device Manager Storage - Store Contract, Cache Regions and Entity Services
//!
//! The record store is the source of truth; cache regions hold derived
//! copies. Entity services read through the regions and route every write
//! through the consistency coordinator so the regions follow the store.

pub mod cache;
pub mod service;
pub mod store;
pub mod telemetry;

pub use cache::{
    read_through, CacheBackend, CacheRead, CacheRegion, CacheRegistry, CacheStats, CachedRecord,
    Committed, ConsistencyCoordinator, EffectPlan, EffectReport, EntityRegions,
    InMemoryCacheBackend, ReadSource, RegionKind, WriteOp, Written,
};
pub use service::{DriverAttributeService, Reply};
pub use store::{InMemoryRecordStore, RecordStore, StoreResult};
pub use telemetry::{init_tracing, TelemetryConfig};
