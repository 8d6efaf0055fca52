//! Common test utilities: in-memory repository, counting builder, fixtures

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use facility_settings::contract::{SettingRecord, SettingsQuery, SettingsScope};
use facility_settings::domain::{SettingsBuilder, SettingsCache, SettingsRepository, SettingsStore};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const FACILITY_A: &str = "facility-a";
pub const FACILITY_B: &str = "facility-b";

pub fn print_test_header(test_name: &str, purpose: &[&str]) {
    println!("\n🧪 TEST: {}", test_name);
    if let Some(first) = purpose.first() {
        println!("📋 PURPOSE: {}", first);
    }
    for line in purpose.iter().skip(1) {
        println!("   {}", line);
    }
}

// ===== Repository =====

/// In-memory settings repository with call counting and failure injection
#[derive(Clone, Default)]
pub struct MockSettingsRepo {
    rows: Arc<RwLock<HashMap<Uuid, SettingRecord>>>,
    find_calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    upsert_budget: Arc<RwLock<Option<usize>>>,
}

impl MockSettingsRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Let `count` more upserts succeed, then fail every one after them
    pub fn fail_upserts_after(&self, count: usize) {
        *self.upsert_budget.write() = Some(count);
    }

    /// Every row, including soft-deleted ones
    pub fn all_rows(&self) -> Vec<SettingRecord> {
        self.rows.read().values().cloned().collect()
    }

    pub fn live_count(&self) -> usize {
        self.rows
            .read()
            .values()
            .filter(|r| r.deleted_at.is_none())
            .count()
    }

    /// Put a row straight into storage, bypassing the store and its observers
    pub fn insert_raw(&self, record: SettingRecord) {
        self.rows.write().insert(record.id, record);
    }

    /// Backdate a soft deletion, for retention tests
    pub fn set_deleted_at(&self, id: Uuid, at: DateTime<Utc>) {
        if let Some(row) = self.rows.write().get_mut(&id) {
            row.deleted_at = Some(at);
        }
    }

    pub fn print_state(&self, context: &str) {
        let rows = self.rows.read();
        println!("\n========== Repository State: {} ==========", context);
        let mut sorted: Vec<&SettingRecord> = rows.values().collect();
        sorted.sort_by(|a, b| (a.scope, &a.facility_id, &a.key).cmp(&(b.scope, &b.facility_id, &b.key)));
        for row in sorted {
            println!(
                "  [{}{}] {} = {}{}",
                row.scope,
                row.facility_id.as_deref().map(|f| format!(":{}", f)).unwrap_or_default(),
                row.key,
                row.value,
                if row.deleted_at.is_some() { " (deleted)" } else { "" }
            );
        }
        println!("================================================\n");
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("database unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for MockSettingsRepo {
    async fn find_rows(&self, query: &SettingsQuery) -> Result<Vec<SettingRecord>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;

        let mut rows: Vec<SettingRecord> = self
            .rows
            .read()
            .values()
            .filter(|r| {
                r.deleted_at.is_none()
                    && r.scope == query.scope
                    && r.facility_id == query.facility_id
                    && query.matches_key(&r.key)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(rows)
    }

    async fn upsert(&self, record: &SettingRecord) -> Result<(SettingRecord, bool)> {
        self.check()?;
        if let Some(left) = self.upsert_budget.write().as_mut() {
            if *left == 0 {
                anyhow::bail!("connection reset during upsert");
            }
            *left -= 1;
        }

        let mut rows = self.rows.write();
        let existing = rows.values_mut().find(|r| {
            r.deleted_at.is_none()
                && r.scope == record.scope
                && r.facility_id == record.facility_id
                && r.key == record.key
        });

        match existing {
            Some(row) => {
                row.value = record.value.clone();
                row.updated_at = Utc::now();
                Ok((row.clone(), false))
            }
            None => {
                rows.insert(record.id, record.clone());
                Ok((record.clone(), true))
            }
        }
    }

    async fn soft_delete(&self, ids: &[Uuid]) -> Result<u64> {
        self.check()?;

        let mut rows = self.rows.write();
        let now = Utc::now();
        let mut affected = 0;
        for id in ids {
            if let Some(row) = rows.get_mut(id).filter(|r| r.deleted_at.is_none()) {
                row.deleted_at = Some(now);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn find_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<SettingRecord>> {
        self.check()?;

        Ok(self
            .rows
            .read()
            .values()
            .filter(|r| r.deleted_at.is_some_and(|at| at < cutoff))
            .cloned()
            .collect())
    }

    async fn hard_delete(&self, ids: &[Uuid]) -> Result<u64> {
        self.check()?;

        let mut rows = self.rows.write();
        Ok(ids.iter().filter(|id| rows.remove(*id).is_some()).count() as u64)
    }
}

// ===== Builder =====

/// Builder returning fixed trees and counting calls per scope
#[derive(Clone, Default)]
pub struct CountingBuilder {
    trees: Arc<RwLock<HashMap<SettingsScope, Value>>>,
    calls: Arc<RwLock<HashMap<SettingsScope, usize>>>,
    failing: Arc<AtomicBool>,
}

impl CountingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(self, scope: SettingsScope, tree: Value) -> Self {
        self.trees.write().insert(scope, tree);
        self
    }

    /// Calls for one scope; every rebuild calls GLOBAL exactly once
    pub fn calls(&self, scope: SettingsScope) -> usize {
        self.calls.read().get(&scope).copied().unwrap_or(0)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsBuilder for CountingBuilder {
    async fn build(&self, scope: SettingsScope) -> Result<Value> {
        *self.calls.write().entry(scope).or_insert(0) += 1;
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("defaults file unreadable");
        }
        Ok(self
            .trees
            .read()
            .get(&scope)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())))
    }
}

// ===== Fixtures =====

/// Defaults used by most tests: the clinic codes live in GLOBAL, sync in CENTRAL
pub fn clinic_builder() -> CountingBuilder {
    CountingBuilder::new()
        .with_scope(
            SettingsScope::Global,
            json!({
                "timezone": "gmt-3",
                "survey": {
                    "defaultCodes": {
                        "department": "GeneralClinic",
                        "location": "GeneralClinic"
                    }
                }
            }),
        )
        .with_scope(
            SettingsScope::Central,
            json!({
                "timezone": "utc",
                "sync": { "readOnly": false, "persistedCacheBatchSize": 20000 }
            }),
        )
}

pub struct Harness {
    pub repo: MockSettingsRepo,
    pub builder: CountingBuilder,
    pub store: Arc<SettingsStore>,
    pub cache: Arc<SettingsCache>,
}

pub fn harness_with(builder: CountingBuilder, ttl: Duration) -> Harness {
    let repo = MockSettingsRepo::new();
    let store = Arc::new(SettingsStore::new(Arc::new(repo.clone())));
    let cache = SettingsCache::new(store.clone(), Arc::new(builder.clone()), ttl);
    Harness {
        repo,
        builder,
        store,
        cache,
    }
}

pub fn harness() -> Harness {
    harness_with(clinic_builder(), Duration::from_secs(60))
}
