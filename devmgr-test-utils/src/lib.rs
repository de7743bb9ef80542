//! Device Manager Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Fault-injecting store and cache backend wrappers
//! - Proptest generators for entities, filters and pages
//! - Fixtures, including a fully wired service harness

pub use devmgr_core::{
    DriverAttribute, DriverAttributeFilter, DriverAttributeUpdate, ErrorCode, ManagerError,
    ManagerResult, NaturalKey, PageResult, Pages, Predicate, RecordId, ServiceConfig, StoreError,
};
pub use devmgr_storage::{
    CacheBackend, CacheRegistry, CacheStats, DriverAttributeService, EntityRegions,
    InMemoryCacheBackend, InMemoryRecordStore, RecordStore, RegionKind,
};

use async_trait::async_trait;
use devmgr_core::{CacheError, Record};
use devmgr_storage::StoreResult;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

// ============================================================================
// FAULT INJECTION
// ============================================================================

/// Record store wrapper that can fail or no-op on demand and counts calls.
///
/// Reload faults apply to the first read after each mutation that changed
/// rows, which is the service's re-read of the written record.
#[derive(Debug, Default)]
pub struct FaultyStore<S> {
    inner: S,
    unavailable: AtomicBool,
    zero_rows: AtomicBool,
    fail_reload: AtomicBool,
    reload_delay_ms: AtomicU64,
    mutated: AtomicBool,
    inserts: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    reads: AtomicUsize,
}

impl<S> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            unavailable: AtomicBool::new(false),
            zero_rows: AtomicBool::new(false),
            fail_reload: AtomicBool::new(false),
            reload_delay_ms: AtomicU64::new(0),
            mutated: AtomicBool::new(false),
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fail every call with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Report zero rows from every mutation without touching the inner store.
    pub fn set_zero_rows(&self, zero_rows: bool) {
        self.zero_rows.store(zero_rows, Ordering::SeqCst);
    }

    /// Fail the read following a mutation with [`StoreError::Unavailable`].
    pub fn set_fail_reload(&self, fail: bool) {
        self.fail_reload.store(fail, Ordering::SeqCst);
    }

    /// Hold the read following a mutation for `delay`.
    pub fn set_reload_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.reload_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Calls to any select method.
    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check(&self, counter: &AtomicUsize) -> StoreResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "injected store outage".to_string(),
            });
        }
        Ok(())
    }

    fn no_op(&self) -> bool {
        self.zero_rows.load(Ordering::SeqCst)
    }

    fn mutation(&self, rows: StoreResult<u64>) -> StoreResult<u64> {
        if matches!(rows, Ok(n) if n > 0) {
            self.mutated.store(true, Ordering::SeqCst);
        }
        rows
    }

    async fn read(&self) -> StoreResult<()> {
        self.check(&self.reads)?;
        if !self.mutated.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let delay = self.reload_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_reload.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "injected reload failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<R, S> RecordStore<R> for FaultyStore<S>
where
    R: Record,
    S: RecordStore<R>,
{
    async fn insert(&self, record: &mut R) -> StoreResult<u64> {
        self.check(&self.inserts)?;
        if self.no_op() {
            return Ok(0);
        }
        self.mutation(self.inner.insert(record).await)
    }

    async fn update_by_id(&self, patch: &R::Patch) -> StoreResult<u64> {
        self.check(&self.updates)?;
        if self.no_op() {
            return Ok(0);
        }
        self.mutation(self.inner.update_by_id(patch).await)
    }

    async fn delete_by_id(&self, id: RecordId) -> StoreResult<u64> {
        self.check(&self.deletes)?;
        if self.no_op() {
            return Ok(0);
        }
        self.mutation(self.inner.delete_by_id(id).await)
    }

    async fn select_by_id(&self, id: RecordId) -> StoreResult<Option<R>> {
        self.read().await?;
        self.inner.select_by_id(id).await
    }

    async fn select_one(&self, predicate: &Predicate) -> StoreResult<Option<R>> {
        self.read().await?;
        self.inner.select_one(predicate).await
    }

    async fn select_page(&self, page: &Pages, predicate: &Predicate) -> StoreResult<PageResult<R>> {
        self.read().await?;
        self.inner.select_page(page, predicate).await
    }

    async fn select_list(&self, predicate: &Predicate) -> StoreResult<Vec<R>> {
        self.read().await?;
        self.inner.select_list(predicate).await
    }
}

/// Cache backend wrapper whose reads and writes can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyCacheBackend {
    inner: InMemoryCacheBackend,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryCacheBackend {
        &self.inner
    }

    /// Fail `get` with [`CacheError::Unavailable`].
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fail `put`, `evict` and `evict_all` with [`CacheError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool, region: &str) -> Result<(), CacheError> {
        if flag.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable {
                region: region.to_string(),
                reason: "injected cache outage".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FlakyCacheBackend {
    async fn get(&self, region: &str, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.check(&self.fail_reads, region)?;
        self.inner.get(region, key).await
    }

    async fn put(&self, region: &str, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        self.check(&self.fail_writes, region)?;
        self.inner.put(region, key, value).await
    }

    async fn evict(&self, region: &str, key: &str) -> Result<(), CacheError> {
        self.check(&self.fail_writes, region)?;
        self.inner.evict(region, key).await
    }

    async fn evict_all(&self, region: &str) -> Result<u64, CacheError> {
        self.check(&self.fail_writes, region)?;
        self.inner.evict_all(region).await
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        self.inner.stats().await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for device-manager types.

    use super::*;
    use proptest::prelude::*;

    /// Attribute names; a small alphabet so collisions happen.
    pub fn arb_name() -> impl Strategy<Value = String> {
        "[a-d][a-d0-9]{0,2}"
    }

    /// Driver ids from a small range so names collide across drivers too.
    pub fn arb_driver_id() -> impl Strategy<Value = RecordId> {
        1i64..=3
    }

    pub fn arb_attribute_type() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("string".to_string()),
            Just("int".to_string()),
            Just("float".to_string()),
            Just("boolean".to_string()),
        ]
    }

    pub fn arb_driver_attribute() -> impl Strategy<Value = DriverAttribute> {
        (
            arb_name(),
            "[A-Z][a-z]{0,8}",
            arb_attribute_type(),
            arb_driver_id(),
            proptest::option::of("[0-9]{1,3}"),
        )
            .prop_map(|(name, display_name, attribute_type, driver_id, value)| {
                let attribute = DriverAttribute::new(name, display_name, attribute_type, driver_id);
                match value {
                    Some(v) => attribute.with_value(v),
                    None => attribute,
                }
            })
    }

    /// Optional strings including blanks, which must never constrain.
    pub fn arb_filter_text() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some(String::new())),
            Just(Some("  ".to_string())),
            arb_name().prop_map(Some),
        ]
    }

    pub fn arb_pages() -> impl Strategy<Value = Pages> {
        (1u64..4, 1u64..6).prop_map(|(current, size)| Pages::new(current, size))
    }

    pub fn arb_filter() -> impl Strategy<Value = DriverAttributeFilter> {
        (
            arb_filter_text(),
            arb_filter_text(),
            proptest::option::of(arb_attribute_type()),
            proptest::option::of(arb_driver_id()),
            proptest::option::of(arb_pages()),
        )
            .prop_map(|(display_name, name, attribute_type, driver_id, page)| {
                DriverAttributeFilter {
                    display_name,
                    name,
                    attribute_type,
                    driver_id,
                    page,
                }
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use std::sync::Arc;

    pub type TestStore = FaultyStore<InMemoryRecordStore<DriverAttribute>>;
    pub type TestService = DriverAttributeService<TestStore>;

    /// The `temp` attribute of driver 5.
    pub fn temperature() -> DriverAttribute {
        DriverAttribute::new("temp", "Temperature", "float", 5).with_unit("C")
    }

    pub fn attribute(name: &str, driver_id: RecordId) -> DriverAttribute {
        DriverAttribute::new(name, format!("{} label", name), "string", driver_id)
    }

    /// A service over fault-injecting store and cache, with direct access
    /// to both for assertions.
    pub struct ServiceHarness {
        pub backend: Arc<FlakyCacheBackend>,
        pub store: Arc<TestStore>,
        pub regions: EntityRegions,
        pub service: TestService,
    }

    impl ServiceHarness {
        pub fn new() -> Self {
            Self::with_config(ServiceConfig::default().with_cache_namespace("test"))
        }

        pub fn with_config(config: ServiceConfig) -> Self {
            let backend = Arc::new(FlakyCacheBackend::new());
            let regions = EntityRegions::of::<DriverAttribute>(&config.cache_namespace);
            let registry = Arc::new(CacheRegistry::for_entities(backend.clone(), [&regions]));
            let store = Arc::new(FaultyStore::new(InMemoryRecordStore::new()));
            let service = DriverAttributeService::new(Arc::clone(&store), registry, config)
                .unwrap_or_else(|e| panic!("harness regions must be registered: {}", e));
            Self {
                backend,
                store,
                regions,
                service,
            }
        }

        pub fn region(&self, kind: RegionKind) -> String {
            self.regions.name(kind)
        }

        pub fn cached(&self, kind: RegionKind, key: &str) -> bool {
            self.backend.inner().contains(&self.region(kind), key)
        }

        pub fn region_len(&self, kind: RegionKind) -> usize {
            self.backend.inner().region_len(&self.region(kind))
        }

        /// Entry counts of all four regions, in [`RegionKind::ALL`] order.
        pub fn snapshot(&self) -> [usize; 4] {
            RegionKind::ALL.map(|kind| self.region_len(kind))
        }

        /// Seed a region entry directly, bypassing the service.
        pub async fn seed(&self, kind: RegionKind, key: &str, value: &serde_json::Value) {
            let bytes = serde_json::to_vec(value)
                .unwrap_or_else(|e| panic!("fixture value must serialize: {}", e));
            self.backend
                .inner()
                .put(&self.region(kind), key, bytes)
                .await
                .unwrap_or_else(|e| panic!("in-memory put cannot fail: {}", e));
        }
    }

    impl Default for ServiceHarness {
        fn default() -> Self {
            Self::new()
        }
    }
}
