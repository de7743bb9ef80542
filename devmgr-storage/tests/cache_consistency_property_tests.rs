//! Property-Based Tests for Cache Consistency
//!
//! **Property: cached views follow the store**
//!
//! For any sequence of adds, updates, deletes and reads issued through the
//! service, every cached lookup (by id, by natural key, by filtered page and
//! by dictionary) returns exactly what an uncached query of the store
//! returns at that moment.
//!
//! **Property: absent results are never cached**
//!
//! **Property: predicates ignore blank filter fields**

use devmgr_core::{DictionaryEntry, Record, ToPredicate};
use devmgr_storage::{CacheBackend, RecordStore, RegionKind};
use devmgr_test_utils::fixtures::ServiceHarness;
use devmgr_test_utils::generators::{
    arb_driver_attribute, arb_driver_id, arb_filter, arb_filter_text, arb_name,
};
use devmgr_test_utils::{
    DriverAttribute, DriverAttributeFilter, DriverAttributeUpdate, ManagerError, Predicate,
    RecordId,
};
use proptest::prelude::*;
use tokio::runtime::Runtime;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

/// Highest id the command generators aim at; misses are intended.
const MAX_ID: RecordId = 8;

#[derive(Debug, Clone)]
enum Command {
    Add(DriverAttribute),
    Update {
        id: RecordId,
        name: Option<String>,
        display_name: Option<String>,
    },
    Delete(RecordId),
    ReadId(RecordId),
    ReadName(String, RecordId),
    List(DriverAttributeFilter),
    Dictionary(RecordId),
}

fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        3 => arb_driver_attribute().prop_map(Command::Add),
        2 => (
            1..=MAX_ID,
            prop::option::of(arb_name()),
            prop::option::of("[A-Z][a-z]{0,6}"),
        )
            .prop_map(|(id, name, display_name)| Command::Update {
                id,
                name,
                display_name,
            }),
        1 => (1..=MAX_ID).prop_map(Command::Delete),
        2 => (1..=MAX_ID).prop_map(Command::ReadId),
        2 => (arb_name(), arb_driver_id()).prop_map(|(n, d)| Command::ReadName(n, d)),
        2 => arb_filter().prop_map(Command::List),
        1 => arb_driver_id().prop_map(Command::Dictionary),
    ]
}

/// Duplicate rejections are expected outcomes; everything else must succeed.
fn tolerate_duplicate<T>(result: Result<T, ManagerError>) -> Result<(), TestCaseError> {
    match result {
        Ok(_) | Err(ManagerError::DuplicateEntity { .. }) => Ok(()),
        Err(e) => Err(TestCaseError::fail(format!("unexpected failure: {}", e))),
    }
}

async fn run(h: &ServiceHarness, command: Command) -> Result<(), TestCaseError> {
    match command {
        Command::Add(attribute) => tolerate_duplicate(h.service.add(attribute).await),
        Command::Update {
            id,
            name,
            display_name,
        } => {
            let mut patch = DriverAttributeUpdate::new(id);
            patch.name = name;
            patch.display_name = display_name;
            tolerate_duplicate(h.service.update(patch).await)
        }
        Command::Delete(id) => tolerate_duplicate(h.service.delete(id).await),
        Command::ReadId(id) => tolerate_duplicate(h.service.select_by_id(id).await),
        Command::ReadName(name, driver_id) => tolerate_duplicate(
            h.service
                .select_by_name_and_driver_id(&name, driver_id)
                .await,
        ),
        Command::List(filter) => tolerate_duplicate(h.service.list(&filter).await),
        Command::Dictionary(driver_id) => tolerate_duplicate(h.service.dictionary(driver_id).await),
    }
}

/// Compare every cached view the service offers with the store.
async fn assert_views_match_store(
    h: &ServiceHarness,
    filters: &[DriverAttributeFilter],
) -> Result<(), TestCaseError> {
    let store = h.store.inner();
    for id in 1..=MAX_ID {
        let cached = h.service.select_by_id(id).await.map_err(fail)?;
        let stored = store.select_by_id(id).await.map_err(fail)?;
        prop_assert_eq!(&cached, &stored, "id view diverged for {}", id);

        if let Some(record) = stored {
            let key = record.natural_key();
            let by_name = h
                .service
                .select_by_name_and_driver_id(&key.name, key.parent_id)
                .await
                .map_err(fail)?;
            prop_assert_eq!(by_name.as_ref(), Some(&record), "name view diverged for {}", key);
        }
    }

    for filter in filters {
        let cached = h.service.list(filter).await.map_err(fail)?;
        let page = h.service.config().resolve_page(filter.page);
        let stored = store
            .select_page(&page, &filter.to_predicate())
            .await
            .map_err(fail)?;
        prop_assert_eq!(cached, stored, "list view diverged for {:?}", filter);
    }

    for driver_id in 1..=3 {
        let cached = h.service.dictionary(driver_id).await.map_err(fail)?;
        let stored: Vec<DictionaryEntry> = store
            .select_list(&Predicate::all().and_eq("driver_id", driver_id))
            .await
            .map_err(fail)?
            .iter()
            .filter_map(DictionaryEntry::from_attribute)
            .collect();
        prop_assert_eq!(cached, stored, "dictionary diverged for driver {}", driver_id);
    }
    Ok(())
}

fn fail(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_cached_views_follow_the_store(
        commands in prop::collection::vec(command_strategy(), 1..30),
        filters in prop::collection::vec(arb_filter(), 1..4),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = ServiceHarness::new();
            for command in commands {
                run(&h, command).await?;
                assert_views_match_store(&h, &filters).await?;
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_absent_lookups_never_cached(
        ids in prop::collection::vec(1..=MAX_ID, 1..10),
        names in prop::collection::vec((arb_name(), arb_driver_id()), 1..10),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = ServiceHarness::new();
            for id in ids {
                prop_assert_eq!(h.service.select_by_id(id).await.map_err(fail)?, None);
            }
            for (name, driver_id) in names {
                let found = h
                    .service
                    .select_by_name_and_driver_id(&name, driver_id)
                    .await
                    .map_err(fail)?;
                prop_assert_eq!(found, None);
            }
            prop_assert_eq!(h.region_len(RegionKind::Id), 0);
            prop_assert_eq!(h.region_len(RegionKind::Name), 0);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_add_then_read_returns_same_entity(attribute in arb_driver_attribute()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = ServiceHarness::new();
            let added = h
                .service
                .add(attribute)
                .await
                .map_err(fail)?
                .ok_or_else(|| TestCaseError::fail("add wrote nothing"))?;
            let id = added.id().ok_or_else(|| TestCaseError::fail("no id"))?;

            // First read is served from the region populated by the add.
            let cached = h.service.select_by_id(id).await.map_err(fail)?;
            prop_assert_eq!(cached.as_ref(), Some(&added));

            h.backend.inner().evict_all(&h.region(RegionKind::Id)).await.map_err(fail)?;
            let loaded = h.service.select_by_id(id).await.map_err(fail)?;
            prop_assert_eq!(loaded.as_ref(), Some(&added));
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_blank_filter_text_matches_everything(
        attributes in prop::collection::vec(arb_driver_attribute(), 1..8),
        name in arb_filter_text(),
        display_name in arb_filter_text(),
    ) {
        prop_assume!(
            name.as_deref().map_or(true, |s| s.trim().is_empty())
                && display_name.as_deref().map_or(true, |s| s.trim().is_empty())
        );
        let filter = DriverAttributeFilter {
            name,
            display_name,
            ..Default::default()
        };
        prop_assert!(filter.to_predicate().is_empty());
        prop_assert!(attributes.iter().all(|a| filter.to_predicate().matches(a)));
    }
}
