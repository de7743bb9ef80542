//! Driver attribute service.
//!
//! Reads are cache-aside over the four driver attribute regions. Writes run
//! against the record store inside the consistency coordinator, which applies
//! the region effects once the store confirms the write.

use std::sync::Arc;

use devmgr_core::{
    fields, now, DictionaryEntry, DriverAttribute, DriverAttributeFilter, DriverAttributeUpdate,
    ManagerError, ManagerResult, NaturalKey, PageResult, Predicate, Record, RecordId,
    ServiceConfig, StoreError, ToPredicate,
};

use crate::cache::{
    read_through, CacheRead, CacheRegion, CacheRegistry, CacheStats, CachedRecord,
    ConsistencyCoordinator, EntityRegions, RegionKind, WriteOp, Written,
};
use crate::store::RecordStore;

/// Store failures as seen by callers; a natural-key collision is a duplicate.
fn store_error(error: StoreError) -> ManagerError {
    match error {
        StoreError::UniqueViolation { key } => ManagerError::DuplicateEntity { key },
        other => ManagerError::Store(other),
    }
}

/// Key in the DIC region for one driver's dictionary.
fn dictionary_key(driver_id: RecordId) -> String {
    format!("driver:{}", driver_id)
}

/// Cache-consistent operations on driver attributes.
pub struct DriverAttributeService<S> {
    store: Arc<S>,
    registry: Arc<CacheRegistry>,
    coordinator: ConsistencyCoordinator,
    by_id: CacheRegion,
    by_name: CacheRegion,
    lists: CacheRegion,
    dictionaries: CacheRegion,
    config: ServiceConfig,
}

impl<S> std::fmt::Debug for DriverAttributeService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverAttributeService")
            .field("regions", self.coordinator.regions())
            .field("config", &self.config)
            .finish()
    }
}

impl<S: RecordStore<DriverAttribute> + 'static> DriverAttributeService<S> {
    /// Create a service over `store`, resolving its regions in `registry`.
    ///
    /// Fails with [`CacheError::UnknownRegion`](devmgr_core::CacheError::UnknownRegion)
    /// when the registry was not built with the driver attribute regions
    /// under the configured namespace.
    pub fn new(
        store: Arc<S>,
        registry: Arc<CacheRegistry>,
        config: ServiceConfig,
    ) -> ManagerResult<Self> {
        let regions = EntityRegions::of::<DriverAttribute>(&config.cache_namespace);
        let by_id = registry.region(&regions.name(RegionKind::Id))?;
        let by_name = registry.region(&regions.name(RegionKind::Name))?;
        let lists = registry.region(&regions.name(RegionKind::List))?;
        let dictionaries = registry.region(&regions.name(RegionKind::Dic))?;
        let coordinator = ConsistencyCoordinator::new(Arc::clone(&registry), regions);
        Ok(Self {
            store,
            registry,
            coordinator,
            by_id,
            by_name,
            lists,
            dictionaries,
            config,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Insert a new attribute.
    ///
    /// Returns the stored record as re-read after the insert, or `None` when
    /// the store wrote nothing. An existing (`name`, `driver_id`) pair fails
    /// with [`ManagerError::DuplicateEntity`] before any insert is attempted.
    /// A committed insert whose re-read fails returns
    /// [`ManagerError::Unconfirmed`]; its cached views are evicted regardless.
    pub async fn add(&self, attribute: DriverAttribute) -> ManagerResult<Option<DriverAttribute>> {
        let key = attribute.natural_key();
        if self
            .select_by_name_and_driver_id(&key.name, key.parent_id)
            .await?
            .is_some()
        {
            tracing::debug!(%key, "add rejected: natural key exists");
            return Err(ManagerError::DuplicateEntity { key });
        }

        let store = &*self.store;
        let committed = self
            .coordinator
            .around::<DriverAttribute, _, _>(WriteOp::Add, &self.store, async move {
                let mut record = attribute;
                let rows = store.insert(&mut record).await.map_err(store_error)?;
                Ok::<_, ManagerError>(Written::inserted(rows, record.id()))
            })
            .await?;

        let added = committed.into_record()?;
        if let Some(record) = &added {
            tracing::info!(id = ?record.id, key = %record.natural_key(), "driver attribute added");
        }
        Ok(added)
    }

    /// Apply a partial update.
    ///
    /// Returns the authoritative stored record after the update, or `None`
    /// when no record has the patch's id. A patch that moves the record onto
    /// another record's natural key fails with [`ManagerError::DuplicateEntity`],
    /// and a committed update that cannot be re-read with
    /// [`ManagerError::Unconfirmed`].
    pub async fn update(
        &self,
        patch: DriverAttributeUpdate,
    ) -> ManagerResult<Option<DriverAttribute>> {
        let id = patch.id;
        let Some(prior) = self.store.select_by_id(id).await? else {
            tracing::debug!(id, "update skipped: no such record");
            return Ok(None);
        };

        let previous = prior.natural_key();
        let mut target = prior;
        target.apply_patch(&patch, now());
        let next = target.natural_key();
        if next != previous {
            if let Some(existing) = self
                .select_by_name_and_driver_id(&next.name, next.parent_id)
                .await?
            {
                if existing.id != Some(id) {
                    return Err(ManagerError::DuplicateEntity { key: next });
                }
            }
        }

        let store = &*self.store;
        let committed = self
            .coordinator
            .around::<DriverAttribute, _, _>(WriteOp::Update, &self.store, async move {
                let rows = store.update_by_id(&patch).await.map_err(store_error)?;
                Ok::<_, ManagerError>(Written::updated(rows, id, previous))
            })
            .await?;

        let updated = committed.into_record()?;
        if let Some(record) = &updated {
            tracing::info!(id, key = %record.natural_key(), "driver attribute updated");
        }
        Ok(updated)
    }

    /// Delete by id. `false` when nothing was deleted.
    pub async fn delete(&self, id: RecordId) -> ManagerResult<bool> {
        let store = &*self.store;
        let committed = self
            .coordinator
            .around::<DriverAttribute, _, _>(WriteOp::Delete, &self.store, async move {
                let rows = store.delete_by_id(id).await?;
                Ok::<_, ManagerError>(Written::removed(rows, id))
            })
            .await?;

        let deleted = committed.is_committed();
        tracing::info!(id, deleted, "driver attribute delete");
        Ok(deleted)
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub async fn select_by_id(&self, id: RecordId) -> ManagerResult<Option<DriverAttribute>> {
        let store = &*self.store;
        let read = read_through(&self.by_id, &DriverAttribute::id_key(id), move || async move {
            store.select_by_id(id).await.map_err(ManagerError::from)
        })
        .await?;
        Ok(read.map(CacheRead::into_value))
    }

    /// Look up by natural key.
    ///
    /// Fails with [`StoreError::AmbiguousResult`] if the store holds more than
    /// one match.
    pub async fn select_by_name_and_driver_id(
        &self,
        name: &str,
        driver_id: RecordId,
    ) -> ManagerResult<Option<DriverAttribute>> {
        let key = NaturalKey::new(name, driver_id);
        let predicate = &Predicate::natural_key(&key);
        let store = &*self.store;
        let read = read_through(&self.by_name, &DriverAttribute::name_key(&key), move || async move {
            store.select_one(predicate).await.map_err(ManagerError::from)
        })
        .await?;
        Ok(read.map(CacheRead::into_value))
    }

    /// One page of attributes matching `filter`.
    ///
    /// Pages are cached whole, keyed by the filter's predicate and the
    /// effective page. A missing page uses the configured default; oversized
    /// pages are clamped.
    pub async fn list(
        &self,
        filter: &DriverAttributeFilter,
    ) -> ManagerResult<PageResult<DriverAttribute>> {
        let page = self.config.resolve_page(filter.page);
        let predicate = &filter.to_predicate();
        let key = predicate.page_key(&page);
        let store = &*self.store;
        let read = read_through(&self.lists, &key, move || async move {
            store
                .select_page(&page, predicate)
                .await
                .map(Some)
                .map_err(ManagerError::from)
        })
        .await?;
        Ok(read.map_or_else(|| PageResult::new(Vec::new(), 0, page), CacheRead::into_value))
    }

    /// Label/value dictionary of one driver's attributes, ordered by id.
    pub async fn dictionary(&self, driver_id: RecordId) -> ManagerResult<Vec<DictionaryEntry>> {
        let predicate = &Predicate::all().and_eq(fields::DRIVER_ID, driver_id);
        let store = &*self.store;
        let read = read_through(&self.dictionaries, &dictionary_key(driver_id), move || async move {
            let records = store.select_list(predicate).await?;
            Ok::<_, ManagerError>(Some(
                records
                    .iter()
                    .filter_map(DictionaryEntry::from_attribute)
                    .collect::<Vec<_>>(),
            ))
        })
        .await?;
        Ok(read.map(CacheRead::into_value).unwrap_or_default())
    }

    /// Statistics of the cache backend behind this service's regions.
    pub async fn cache_stats(&self) -> ManagerResult<CacheStats> {
        Ok(self.registry.backend().stats().await?)
    }
}
