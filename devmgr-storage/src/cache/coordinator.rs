//! Consistency coordinator: cache effects around committed writes.
//!
//! Each write operation maps to a fixed effect per region:
//!
//! | Operation | ID               | NAME             | LIST      | DIC       |
//! |-----------|------------------|------------------|-----------|-----------|
//! | add       | populate(id)     | populate(name)   | evict all | evict all |
//! | update    | populate(id)     | populate(name)   | evict all | evict all |
//! | delete    | evict(id)        | evict all        | evict all | evict all |
//!
//! LIST and DIC keys are composite signatures unknown at write time, so those
//! regions can only be invalidated wholesale. A delete carries only the id,
//! so the NAME region is cleared too.
//!
//! Effects run only after the write reports a commit, and never when it
//! reports zero rows. The write itself only reports rows affected. Once a
//! commit is in hand, the re-read of the stored record and the effects run on
//! a spawned task: dropping the caller's future cannot skip them. If the
//! re-read fails, every view that may describe the record is evicted instead
//! of populated. Effect failures are logged and never fail the write.

use std::future::Future;
use std::sync::Arc;

use devmgr_core::{CacheError, ManagerError, ManagerResult, NaturalKey, Record, RecordId};
use tracing::Instrument;

use super::registry::{CacheRegistry, EntityRegions, RegionKind};
use super::traits::CachedRecord;
use crate::store::RecordStore;

/// Write operations with cache effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOp {
    Add,
    Update,
    Delete,
}

/// What happens to a region after a committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// Store the committed record under its key.
    Populate,
    /// Remove the committed record's key.
    Evict,
    /// Clear the region.
    EvictAll,
}

/// Effect on one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionEffect {
    pub region: RegionKind,
    pub kind: EffectKind,
}

const fn effect(region: RegionKind, kind: EffectKind) -> RegionEffect {
    RegionEffect { region, kind }
}

const UPSERT_EFFECTS: [RegionEffect; 4] = [
    effect(RegionKind::Id, EffectKind::Populate),
    effect(RegionKind::Name, EffectKind::Populate),
    effect(RegionKind::List, EffectKind::EvictAll),
    effect(RegionKind::Dic, EffectKind::EvictAll),
];

const DELETE_EFFECTS: [RegionEffect; 4] = [
    effect(RegionKind::Id, EffectKind::Evict),
    effect(RegionKind::Name, EffectKind::EvictAll),
    effect(RegionKind::List, EffectKind::EvictAll),
    effect(RegionKind::Dic, EffectKind::EvictAll),
];

impl WriteOp {
    /// Region effects of this operation, in application order.
    pub fn effects(self) -> &'static [RegionEffect] {
        match self {
            WriteOp::Add | WriteOp::Update => &UPSERT_EFFECTS,
            WriteOp::Delete => &DELETE_EFFECTS,
        }
    }
}

/// Rows-affected outcome of a write, before the record is re-read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Written {
    /// The record with this id was inserted or updated.
    Upserted {
        id: RecordId,
        /// Natural key the record held before the write, for updates.
        previous: Option<NaturalKey>,
    },
    /// The record with this id was removed.
    Removed { id: RecordId },
    /// Zero rows affected.
    Nothing,
}

impl Written {
    /// An insert that assigned `id`.
    pub fn inserted(rows: u64, id: Option<RecordId>) -> Self {
        match id {
            Some(id) if rows > 0 => Written::Upserted { id, previous: None },
            _ => Written::Nothing,
        }
    }

    /// An update of the record that held `previous` before the write.
    pub fn updated(rows: u64, id: RecordId, previous: NaturalKey) -> Self {
        if rows > 0 {
            Written::Upserted {
                id,
                previous: Some(previous),
            }
        } else {
            Written::Nothing
        }
    }

    pub fn removed(rows: u64, id: RecordId) -> Self {
        if rows > 0 {
            Written::Removed { id }
        } else {
            Written::Nothing
        }
    }

    /// Id of the committed record, `None` for zero rows.
    pub fn id(&self) -> Option<RecordId> {
        match self {
            Written::Upserted { id, .. } | Written::Removed { id } => Some(*id),
            Written::Nothing => None,
        }
    }
}

/// Outcome of a write after the stored record was re-read.
#[derive(Debug, Clone, PartialEq)]
pub enum Committed<R> {
    /// The write committed and this is the authoritative record.
    Stored {
        record: R,
        /// Natural key the record held before this write, when it changed.
        superseded: Option<NaturalKey>,
    },
    /// The record with this id was removed.
    Removed { id: RecordId },
    /// The write committed but the record could not be re-read.
    Unconfirmed { id: RecordId, reason: String },
    /// Zero rows affected.
    Nothing,
}

impl<R: Record> Committed<R> {
    pub fn stored(record: R) -> Self {
        Committed::Stored {
            record,
            superseded: None,
        }
    }

    /// Stored record whose natural key may have moved away from `previous`.
    pub fn replaced(record: R, previous: NaturalKey) -> Self {
        let superseded = (record.natural_key() != previous).then_some(previous);
        Committed::Stored { record, superseded }
    }

    pub fn removed(id: RecordId) -> Self {
        Committed::Removed { id }
    }

    pub fn is_committed(&self) -> bool {
        !matches!(self, Committed::Nothing)
    }

    /// The stored record, `None` for removals and zero rows.
    ///
    /// An unconfirmed write fails with [`ManagerError::Unconfirmed`].
    pub fn into_record(self) -> ManagerResult<Option<R>> {
        match self {
            Committed::Stored { record, .. } => Ok(Some(record)),
            Committed::Unconfirmed { id, reason } => Err(ManagerError::Unconfirmed { id, reason }),
            Committed::Removed { .. } | Committed::Nothing => Ok(None),
        }
    }

    fn id(&self) -> Option<RecordId> {
        match self {
            Committed::Stored { record, .. } => record.id(),
            Committed::Removed { id } | Committed::Unconfirmed { id, .. } => Some(*id),
            Committed::Nothing => None,
        }
    }
}

/// Re-read an upserted record from the store.
async fn confirm<R, S>(written: Written, store: &S) -> Committed<R>
where
    R: Record,
    S: RecordStore<R> + ?Sized,
{
    let (id, previous) = match written {
        Written::Upserted { id, previous } => (id, previous),
        Written::Removed { id } => return Committed::Removed { id },
        Written::Nothing => return Committed::Nothing,
    };
    match store.select_by_id(id).await {
        Ok(Some(record)) => match previous {
            Some(previous) => Committed::replaced(record, previous),
            None => Committed::stored(record),
        },
        Ok(None) => {
            tracing::warn!(id, "record missing on re-read after committed write");
            Committed::Unconfirmed {
                id,
                reason: "record missing on re-read".to_string(),
            }
        }
        Err(e) => {
            tracing::warn!(id, error = %e, "re-read after committed write failed; evicting cached views");
            Committed::Unconfirmed {
                id,
                reason: e.to_string(),
            }
        }
    }
}

/// One concrete cache operation.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheStep<R> {
    Put { region: String, key: String, value: R },
    Evict { region: String, key: String },
    EvictAll { region: String },
}

impl<R> CacheStep<R> {
    pub fn region(&self) -> &str {
        match self {
            CacheStep::Put { region, .. }
            | CacheStep::Evict { region, .. }
            | CacheStep::EvictAll { region } => region,
        }
    }
}

/// Counts of cache steps applied and failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectReport {
    pub applied: usize,
    pub failed: usize,
}

/// Ordered cache steps derived from a committed write.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectPlan<R> {
    steps: Vec<CacheStep<R>>,
}

impl<R: CachedRecord> EffectPlan<R> {
    /// Expand the operation's effect table against the committed outcome.
    ///
    /// An uncommitted outcome yields an empty plan.
    pub fn build(op: WriteOp, committed: &Committed<R>, regions: &EntityRegions) -> Self {
        let mut steps = Vec::new();
        if !committed.is_committed() {
            return Self { steps };
        }

        for effect in op.effects() {
            let region = regions.name(effect.region);
            match effect.kind {
                EffectKind::Populate => match committed {
                    Committed::Stored { record, superseded } => match effect.region {
                        RegionKind::Id => {
                            if let Some(id) = record.id() {
                                steps.push(CacheStep::Put {
                                    region,
                                    key: R::id_key(id),
                                    value: record.clone(),
                                });
                            }
                        }
                        RegionKind::Name => {
                            if let Some(previous) = superseded {
                                steps.push(CacheStep::Evict {
                                    region: region.clone(),
                                    key: R::name_key(previous),
                                });
                            }
                            steps.push(CacheStep::Put {
                                region,
                                key: R::name_key(&record.natural_key()),
                                value: record.clone(),
                            });
                        }
                        // Composite-keyed regions are never populated on write.
                        RegionKind::List | RegionKind::Dic => {
                            steps.push(CacheStep::EvictAll { region });
                        }
                    },
                    // Nothing to populate with; drop whatever may describe the record.
                    Committed::Unconfirmed { id, .. } => match effect.region {
                        RegionKind::Id => steps.push(CacheStep::Evict {
                            region,
                            key: R::id_key(*id),
                        }),
                        _ => steps.push(CacheStep::EvictAll { region }),
                    },
                    Committed::Removed { .. } | Committed::Nothing => {}
                },
                EffectKind::Evict => match (effect.region, committed.id()) {
                    (RegionKind::Id, Some(id)) => steps.push(CacheStep::Evict {
                        region,
                        key: R::id_key(id),
                    }),
                    // Only the id is known for removals; clear what cannot be keyed.
                    _ => steps.push(CacheStep::EvictAll { region }),
                },
                EffectKind::EvictAll => steps.push(CacheStep::EvictAll { region }),
            }
        }
        Self { steps }
    }

    pub fn steps(&self) -> &[CacheStep<R>] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply every step. A failing step is logged and the rest still run.
    pub async fn apply(self, registry: &CacheRegistry) -> EffectReport {
        let mut report = EffectReport::default();
        for step in self.steps {
            let region_name = step.region().to_string();
            match apply_step(registry, step).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        region = %region_name,
                        error = %e,
                        "cache effect failed after committed write; region may serve stale data"
                    );
                }
            }
        }
        report
    }
}

async fn apply_step<R: CachedRecord>(
    registry: &CacheRegistry,
    step: CacheStep<R>,
) -> Result<(), CacheError> {
    match step {
        CacheStep::Put { region, key, value } => {
            registry.region(&region)?.put(&key, &value).await?;
            tracing::debug!(%region, %key, "cache populated");
        }
        CacheStep::Evict { region, key } => {
            registry.region(&region)?.evict(&key).await?;
            tracing::debug!(%region, %key, "cache key evicted");
        }
        CacheStep::EvictAll { region } => {
            let removed = registry.region(&region)?.evict_all().await?;
            tracing::debug!(%region, removed, "cache region cleared");
        }
    }
    Ok(())
}

/// Wraps writes for one entity type with their cache effects.
#[derive(Debug, Clone)]
pub struct ConsistencyCoordinator {
    registry: Arc<CacheRegistry>,
    regions: EntityRegions,
}

impl ConsistencyCoordinator {
    pub fn new(registry: Arc<CacheRegistry>, regions: EntityRegions) -> Self {
        Self { registry, regions }
    }

    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    pub fn regions(&self) -> &EntityRegions {
        &self.regions
    }

    /// Run `write`, then re-read the record and apply `op`'s cache effects
    /// if it committed.
    ///
    /// A failed write or a zero-rows outcome touches no region. Everything
    /// after the commit runs on a spawned task that the caller's cancellation
    /// cannot stop.
    pub async fn around<R, S, W>(
        &self,
        op: WriteOp,
        store: &Arc<S>,
        write: W,
    ) -> ManagerResult<Committed<R>>
    where
        R: CachedRecord,
        S: RecordStore<R> + 'static,
        W: Future<Output = ManagerResult<Written>>,
    {
        let written = write.await?;
        let Some(id) = written.id() else {
            tracing::debug!(?op, "write affected no rows; cache untouched");
            return Ok(Committed::Nothing);
        };

        let store = Arc::clone(store);
        let registry = Arc::clone(&self.registry);
        let regions = self.regions.clone();
        let task = tokio::spawn(
            async move {
                let committed: Committed<R> = confirm(written, &*store).await;
                let report = EffectPlan::build(op, &committed, &regions)
                    .apply(&registry)
                    .await;
                (committed, report)
            }
            .in_current_span(),
        );

        match task.await {
            Ok((committed, report)) => {
                tracing::debug!(?op, id, applied = report.applied, failed = report.failed, "cache effects applied");
                Ok(committed)
            }
            Err(e) => {
                tracing::error!(?op, id, error = %e, "post-commit task aborted");
                Err(ManagerError::Unconfirmed {
                    id,
                    reason: e.to_string(),
                })
            }
        }
    }
}
