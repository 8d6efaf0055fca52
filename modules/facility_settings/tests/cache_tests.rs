//! Settings cache behaviour: TTL, invalidation, failure handling

mod common;

use async_trait::async_trait;
use common::*;
use facility_settings::contract::{ScopeContext, SettingsError, SettingsScope};
use facility_settings::domain::{SettingsBuilder, SettingsCache, SettingsStore};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[tokio::test(start_paused = true)]
async fn test_repeated_get_within_ttl_builds_once() {
    print_test_header(
        "test_repeated_get_within_ttl_builds_once",
        &["Two reads inside the TTL window resolve the tree once"],
    );

    let h = harness();
    let ctx = ScopeContext::global();

    assert_eq!(h.cache.get("timezone", &ctx).await.unwrap(), Some(json!("gmt-3")));
    let finds_after_first = h.repo.find_calls();
    assert_eq!(h.cache.get("timezone", &ctx).await.unwrap(), Some(json!("gmt-3")));

    assert_eq!(h.builder.calls(SettingsScope::Global), 1);
    assert_eq!(h.repo.find_calls(), finds_after_first);
    println!("✅ Builder called once for two reads");
}

#[tokio::test(start_paused = true)]
async fn test_ttl_expiry_triggers_one_rebuild() {
    print_test_header(
        "test_ttl_expiry_triggers_one_rebuild",
        &[
            "Builder returns { timezone: 'gmt-3' }",
            "get twice, advance past the TTL, get again: two builds in total",
        ],
    );

    let builder = CountingBuilder::new().with_scope(SettingsScope::Global, json!({ "timezone": "gmt-3" }));
    let h = harness_with(builder, Duration::from_secs(60));
    let ctx = ScopeContext::global();

    h.cache.get("timezone", &ctx).await.unwrap();
    h.cache.get("timezone", &ctx).await.unwrap();
    assert_eq!(h.builder.calls(SettingsScope::Global), 1);

    tokio::time::advance(Duration::from_secs(59)).await;
    h.cache.get("timezone", &ctx).await.unwrap();
    assert_eq!(h.builder.calls(SettingsScope::Global), 1, "still fresh at 59s");

    tokio::time::advance(Duration::from_secs(2)).await;
    let value = h.cache.get("timezone", &ctx).await.unwrap();
    assert_eq!(value, Some(json!("gmt-3")));
    assert_eq!(h.builder.calls(SettingsScope::Global), 2);

    h.cache.get("timezone", &ctx).await.unwrap();
    assert_eq!(h.builder.calls(SettingsScope::Global), 2);
    println!("✅ Exactly one rebuild after expiry");
}

#[tokio::test(start_paused = true)]
async fn test_new_row_visible_after_unrelated_cached_read() {
    print_test_header(
        "test_new_row_visible_after_unrelated_cached_read",
        &["A cached read of 'timezone' must not hide a just-created 'new-database-key'"],
    );

    let h = harness();
    let ctx = ScopeContext::global();

    assert_eq!(h.cache.get("timezone", &ctx).await.unwrap(), Some(json!("gmt-3")));
    assert_eq!(h.cache.get("new-database-key", &ctx).await.unwrap(), None);

    h.store
        .set("new-database-key", json!("fresh"), SettingsScope::Global, None)
        .await
        .unwrap();

    assert_eq!(
        h.cache.get("new-database-key", &ctx).await.unwrap(),
        Some(json!("fresh"))
    );
    assert_eq!(h.builder.calls(SettingsScope::Global), 2);
    println!("✅ New row visible immediately after the write");
}

#[tokio::test(start_paused = true)]
async fn test_update_and_delete_invalidate_every_context() {
    print_test_header(
        "test_update_and_delete_invalidate_every_context",
        &["Writes in any scope drop the cached trees of all contexts"],
    );

    let h = harness();
    let global = ScopeContext::global();
    let facility = ScopeContext::facility(FACILITY_A);
    let key = "survey.defaultCodes.location";

    h.cache.get(key, &global).await.unwrap();
    h.cache.get(key, &facility).await.unwrap();
    assert_eq!(h.cache.entry_count(), 2);

    h.store
        .set(key, json!("Facility1Clinic"), SettingsScope::Facility, Some(FACILITY_A))
        .await
        .unwrap();
    assert_eq!(h.cache.entry_count(), 0);
    assert_eq!(h.cache.get(key, &facility).await.unwrap(), Some(json!("Facility1Clinic")));

    h.store
        .set(key, json!("Facility1Ward"), SettingsScope::Facility, Some(FACILITY_A))
        .await
        .unwrap();
    assert_eq!(h.cache.get(key, &facility).await.unwrap(), Some(json!("Facility1Ward")));

    h.store
        .delete(key, SettingsScope::Facility, Some(FACILITY_A))
        .await
        .unwrap();
    assert_eq!(h.cache.get(key, &facility).await.unwrap(), Some(json!("GeneralClinic")));
    println!("✅ Create, update and delete each visible on the next read");
}

#[tokio::test(start_paused = true)]
async fn test_write_that_changes_nothing_keeps_cache() {
    let h = harness();
    let ctx = ScopeContext::global();

    h.cache.get("timezone", &ctx).await.unwrap();
    let deleted = h
        .store
        .delete("never.stored", SettingsScope::Global, None)
        .await
        .unwrap();

    assert_eq!(deleted, 0);
    assert_eq!(h.cache.entry_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_key_and_stored_null_differ() {
    print_test_header(
        "test_missing_key_and_stored_null_differ",
        &["A stored null is Some(Null); an absent path is None"],
    );

    let h = harness();
    let ctx = ScopeContext::global();

    h.store
        .set("vaccinations.defaults.locationGroupId", Value::Null, SettingsScope::Global, None)
        .await
        .unwrap();

    assert_eq!(
        h.cache.get("vaccinations.defaults.locationGroupId", &ctx).await.unwrap(),
        Some(Value::Null)
    );
    assert_eq!(h.cache.get("nonexistent.path", &ctx).await.unwrap(), None);
    assert_eq!(h.cache.get("timezone.deeper", &ctx).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_key_fails_before_store_access() {
    let h = harness();

    for key in ["survey..location", ".survey", "survey.", "survey.default codes"] {
        let err = h.cache.get(key, &ScopeContext::global()).await.unwrap_err();
        assert!(matches!(err, SettingsError::InvalidKey { .. }), "{} -> {:?}", key, err);
    }

    assert_eq!(h.repo.find_calls(), 0);
    assert_eq!(h.builder.calls(SettingsScope::Global), 0);
    assert_eq!(h.cache.entry_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_rebuild_keeps_existing_entries() {
    print_test_header(
        "test_failed_rebuild_keeps_existing_entries",
        &[
            "A store failure during a rebuild propagates to the caller",
            "and leaves previously cached trees in place",
        ],
    );

    let h = harness();
    let global = ScopeContext::global();
    let facility = ScopeContext::facility(FACILITY_A);

    h.cache.get("timezone", &global).await.unwrap();
    h.repo.set_failing(true);

    let err = h.cache.get("timezone", &facility).await.unwrap_err();
    assert!(err.is_store_failure());
    assert_eq!(h.cache.entry_count(), 1);

    // Fresh entry still served while the store is down
    assert_eq!(h.cache.get("timezone", &global).await.unwrap(), Some(json!("gmt-3")));

    // Stale entry with a failing rebuild: error surfaces, entry is not removed
    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(h.cache.get("timezone", &global).await.is_err());
    assert_eq!(h.cache.entry_count(), 1);

    h.repo.set_failing(false);
    assert_eq!(h.cache.get("timezone", &global).await.unwrap(), Some(json!("gmt-3")));
    println!("✅ Failures never corrupt the cache");
}

#[tokio::test(start_paused = true)]
async fn test_builder_failure_propagates() {
    let h = harness();
    h.builder.set_failing(true);

    let err = h.cache.get("timezone", &ScopeContext::global()).await.unwrap_err();
    assert!(err.is_store_failure());
    assert!(err.to_string().contains("defaults file unreadable"));
    assert_eq!(h.cache.entry_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_forces_rebuild() {
    let h = harness();
    let ctx = ScopeContext::global();

    h.cache.get("", &ctx).await.unwrap();
    h.cache.reset();
    assert_eq!(h.cache.entry_count(), 0);

    h.cache.get("", &ctx).await.unwrap();
    assert_eq!(h.builder.calls(SettingsScope::Global), 2);
}

#[tokio::test(start_paused = true)]
async fn test_contexts_are_cached_separately() {
    let h = harness();

    h.cache.get("timezone", &ScopeContext::facility(FACILITY_A)).await.unwrap();
    h.cache.get("timezone", &ScopeContext::facility(FACILITY_B)).await.unwrap();
    h.cache
        .get(
            "timezone",
            &ScopeContext::facility(FACILITY_A).with_country_time_zone("Pacific/Auckland"),
        )
        .await
        .unwrap();

    assert_eq!(h.cache.entry_count(), 3);
    assert_eq!(h.builder.calls(SettingsScope::Global), 3);
}

#[tokio::test(start_paused = true)]
async fn test_scoped_handle_typed_reads() {
    #[derive(Debug, serde::Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct SyncSettings {
        read_only: bool,
        persisted_cache_batch_size: u32,
    }

    let h = harness();
    let settings = h.cache.for_context(ScopeContext::facility(FACILITY_A));

    let sync: Option<SyncSettings> = settings.get_as("sync").await.unwrap();
    assert_eq!(
        sync,
        Some(SyncSettings {
            read_only: false,
            persisted_cache_batch_size: 20000
        })
    );

    let missing: Option<SyncSettings> = settings.get_as("sync.missing").await.unwrap();
    assert!(missing.is_none());

    let err = settings.get_as::<u32>("timezone").await.unwrap_err();
    assert!(matches!(err, SettingsError::Validation { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_cache_is_unsubscribed() {
    let h = harness();
    assert_eq!(h.store.observer_count(), 1);

    drop(h.cache);
    assert_eq!(h.store.observer_count(), 0);

    // Writes still succeed with no live observers
    h.store
        .set("timezone", json!("gmt+2"), SettingsScope::Global, None)
        .await
        .unwrap();
}

/// Builder that parks CENTRAL builds until released
#[derive(Default)]
struct GatedBuilder {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl SettingsBuilder for GatedBuilder {
    async fn build(&self, scope: SettingsScope) -> anyhow::Result<Value> {
        if scope == SettingsScope::Central {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(Value::Object(Map::new()))
    }
}

#[tokio::test]
async fn test_rebuild_racing_a_reset_is_not_stored() {
    print_test_header(
        "test_rebuild_racing_a_reset_is_not_stored",
        &["A tree built from pre-reset data must not be cached after the reset"],
    );

    let repo = MockSettingsRepo::new();
    let store = Arc::new(SettingsStore::new(Arc::new(repo)));
    let builder = Arc::new(GatedBuilder::default());
    let cache = SettingsCache::new(store, builder.clone(), Duration::from_secs(60));

    let task = tokio::spawn({
        let cache = cache.clone();
        async move {
            let ctx = ScopeContext::global();
            cache.get("", &ctx).await
        }
    });

    builder.entered.notified().await;
    cache.reset();
    builder.release.notify_one();

    let value = task.await.unwrap().unwrap();
    assert_eq!(value, Some(json!({})));
    assert_eq!(cache.entry_count(), 0);
    println!("✅ Stale rebuild discarded");
}

/// Builder that yields to the scheduler before every build, so concurrent
/// rebuilds interleave
struct YieldingBuilder {
    inner: CountingBuilder,
}

#[async_trait]
impl SettingsBuilder for YieldingBuilder {
    async fn build(&self, scope: SettingsScope) -> anyhow::Result<Value> {
        tokio::task::yield_now().await;
        self.inner.build(scope).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_reads_after_expiry_rebuild_to_equal_trees() {
    print_test_header(
        "test_concurrent_reads_after_expiry_rebuild_to_equal_trees",
        &[
            "Two reads of an expired entry run side by side",
            "Both rebuild, the later store wins, and both see the same tree",
        ],
    );

    let counting = clinic_builder();
    let repo = MockSettingsRepo::new();
    let store = Arc::new(SettingsStore::new(Arc::new(repo)));
    let builder = Arc::new(YieldingBuilder {
        inner: counting.clone(),
    });
    let cache = SettingsCache::new(store, builder, Duration::from_secs(60));
    let ctx = ScopeContext::global();

    cache.get_all(&ctx).await.unwrap();
    assert_eq!(counting.calls(SettingsScope::Global), 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    let (first, second) = tokio::join!(cache.get_all(&ctx), cache.get_all(&ctx));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(counting.calls(SettingsScope::Global), 3, "each reader rebuilt");
    assert_eq!(first, second);
    assert_eq!(cache.entry_count(), 1);

    // The stored tree is fresh again
    assert_eq!(cache.get("timezone", &ctx).await.unwrap(), Some(json!("gmt-3")));
    assert_eq!(counting.calls(SettingsScope::Global), 3);
    println!("✅ Duplicate rebuild tolerated, last write wins");
}

#[tokio::test(start_paused = true)]
async fn test_write_failing_part_way_still_invalidates() {
    print_test_header(
        "test_write_failing_part_way_still_invalidates",
        &[
            "Setting { a: 1, b: 2 } fails on the second leaf",
            "The committed leaf is visible through the cache right away",
        ],
    );

    let h = harness();
    let ctx = ScopeContext::global();
    assert_eq!(h.cache.get("integrations", &ctx).await.unwrap(), None);

    h.repo.fail_upserts_after(1);
    let err = h
        .store
        .set("integrations", json!({ "a": 1, "b": 2 }), SettingsScope::Global, None)
        .await
        .unwrap_err();
    assert!(err.is_store_failure());
    h.repo.print_state("after partial write");

    assert_eq!(h.repo.live_count(), 1);
    assert_eq!(
        h.cache.get("integrations", &ctx).await.unwrap(),
        Some(json!({ "a": 1 }))
    );
    println!("✅ Cache reflects the committed part of a failed write");
}
