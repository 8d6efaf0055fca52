//! Settings store - the write path for setting records
//!
//! All mutations go through here so that observers (the settings cache in
//! particular) are notified after every committed change.

use crate::contract::{LoadOutcome, SettingRecord, SettingsError, SettingsQuery, SettingsScope};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Weak};

use super::builder::read_settings_file;
use super::events::{SettingEvent, SettingsObserver};
use super::key::validate_key;
use super::merge::{flatten, lookup, tree_from_records};
use super::repository::SettingsRepository;
use super::schema::SchemaRegistry;

/// Default limit on the serialized size of a value passed to `set`
pub const DEFAULT_MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Domain service over the settings repository
pub struct SettingsStore {
    repo: Arc<dyn SettingsRepository>,
    observers: RwLock<Vec<Weak<dyn SettingsObserver>>>,
    max_value_size: usize,
    schemas: Option<Arc<SchemaRegistry>>,
}

impl SettingsStore {
    /// Create a new store instance
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self {
            repo,
            observers: RwLock::new(Vec::new()),
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            schemas: None,
        }
    }

    /// Validate every write against the schema of its scope
    pub fn with_schemas(mut self, schemas: Arc<SchemaRegistry>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    pub fn with_max_value_size(mut self, max_value_size: usize) -> Self {
        self.max_value_size = max_value_size;
        self
    }

    // ===== Change notification =====

    /// Register an observer for every committed write.
    ///
    /// Observers are held weakly; a dropped observer is skipped and pruned.
    pub fn subscribe(&self, observer: Weak<dyn SettingsObserver>) {
        self.observers.write().push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }

    fn notify(&self, events: &[SettingEvent]) {
        if events.is_empty() {
            return;
        }

        let live: Vec<Arc<dyn SettingsObserver>> = {
            let mut observers = self.observers.write();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        for event in events {
            for observer in &live {
                observer.on_setting_changed(event);
            }
        }
    }

    // ===== Reads =====

    /// Live rows matching a query
    pub async fn find_rows(&self, query: &SettingsQuery) -> Result<Vec<SettingRecord>, SettingsError> {
        if let Some(key) = &query.key {
            validate_key(key)?;
        }
        query.scope.validate_facility(query.facility_id.as_deref())?;

        Ok(self.repo.find_rows(query).await?)
    }

    /// Value stored at `key` in one scope, ignoring defaults and other scopes
    pub async fn get_scoped(
        &self,
        key: &str,
        scope: SettingsScope,
        facility_id: Option<&str>,
    ) -> Result<Option<Value>, SettingsError> {
        let query = SettingsQuery::key(key, scope, facility_id.map(str::to_string));
        let rows = self.find_rows(&query).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let tree = tree_from_records(&rows);
        Ok(lookup(&tree, key).cloned())
    }

    // ===== Writes =====

    /// Replace the subtree at `key` within a scope.
    ///
    /// Objects are stored as one row per leaf. Rows under `key` that are not
    /// part of the new value are removed. When a write fails part way the
    /// error is returned, and observers are still told about the rows that
    /// were committed before it.
    pub async fn set(
        &self,
        key: &str,
        value: Value,
        scope: SettingsScope,
        facility_id: Option<&str>,
    ) -> Result<Vec<SettingRecord>, SettingsError> {
        validate_key(key)?;
        scope.validate_facility(facility_id)?;

        if key.is_empty() && !value.is_object() {
            return Err(SettingsError::Validation {
                message: "only an object can be stored at the root key".to_string(),
            });
        }

        let size = serde_json::to_vec(&value)
            .map_err(|e| SettingsError::Validation {
                message: format!("value is not serializable: {}", e),
            })?
            .len();
        if size > self.max_value_size {
            return Err(SettingsError::Validation {
                message: format!(
                    "value for '{}' is {} bytes, limit is {}",
                    key, size, self.max_value_size
                ),
            });
        }
        self.check_schema(key, &value, scope)?;

        let facility_id = facility_id.map(str::to_string);
        let leaves = flatten(key, value);
        let new_keys: HashSet<&str> = leaves.iter().map(|(k, _)| k.as_str()).collect();

        let existing = self
            .repo
            .find_rows(&SettingsQuery::key(key, scope, facility_id.clone()))
            .await?;
        let stale: Vec<SettingRecord> = existing
            .into_iter()
            .filter(|r| !new_keys.contains(r.key.as_str()))
            .collect();

        let mut events = Vec::with_capacity(leaves.len() + stale.len());
        let written = self
            .write_subtree(leaves, &stale, scope, &facility_id, &mut events)
            .await;

        // Committed rows reach observers even when a later write failed
        self.notify(&events);

        let stored = match written {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(
                    key,
                    scope = %scope,
                    facility_id = ?facility_id,
                    committed = events.len(),
                    error = %e,
                    "Settings update failed part way"
                );
                return Err(e);
            }
        };

        tracing::info!(
            key,
            scope = %scope,
            facility_id = ?facility_id,
            rows = stored.len(),
            removed = stale.len(),
            "Settings updated"
        );

        Ok(stored)
    }

    /// Upsert the new leaves, then retire stale rows, recording an event per committed change
    async fn write_subtree(
        &self,
        leaves: Vec<(String, Value)>,
        stale: &[SettingRecord],
        scope: SettingsScope,
        facility_id: &Option<String>,
        events: &mut Vec<SettingEvent>,
    ) -> Result<Vec<SettingRecord>, SettingsError> {
        let mut stored = Vec::with_capacity(leaves.len());

        for (leaf_key, leaf_value) in leaves {
            let record = SettingRecord::new(leaf_key, leaf_value, scope, facility_id.clone());
            let (saved, is_new) = self.repo.upsert(&record).await?;
            events.push(SettingEvent::upserted(&saved, is_new));
            stored.push(saved);
        }

        if !stale.is_empty() {
            let ids: Vec<_> = stale.iter().map(|r| r.id).collect();
            self.repo.soft_delete(&ids).await?;
            events.extend(stale.iter().map(SettingEvent::deleted));
        }

        Ok(stored)
    }

    fn check_schema(&self, key: &str, value: &Value, scope: SettingsScope) -> Result<(), SettingsError> {
        match &self.schemas {
            Some(schemas) => schemas.for_scope(scope).validate(key, value),
            None => Ok(()),
        }
    }

    /// Remove the subtree at `key` within a scope
    pub async fn delete(
        &self,
        key: &str,
        scope: SettingsScope,
        facility_id: Option<&str>,
    ) -> Result<usize, SettingsError> {
        let query = SettingsQuery::key(key, scope, facility_id.map(str::to_string));
        let rows = self.find_rows(&query).await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        self.repo.soft_delete(&ids).await?;

        tracing::info!(key, scope = %scope, facility_id = ?facility_id, rows = rows.len(), "Settings deleted");

        let events: Vec<SettingEvent> = rows.iter().map(SettingEvent::deleted).collect();
        self.notify(&events);
        Ok(rows.len())
    }

    /// Load a JSON or YAML file and store it at `key`.
    ///
    /// With `preview` the flattened rows are returned and nothing is written.
    pub async fn load_file(
        &self,
        key: &str,
        path: &Path,
        scope: SettingsScope,
        facility_id: Option<&str>,
        preview: bool,
    ) -> Result<LoadOutcome, SettingsError> {
        validate_key(key)?;
        scope.validate_facility(facility_id)?;

        let value = read_settings_file(path)
            .await
            .map_err(|e| SettingsError::Validation {
                message: format!("{:#}", e),
            })?;

        self.check_schema(key, &value, scope)?;

        let rows = flatten(key, value.clone());
        if !preview {
            self.set(key, value, scope, facility_id).await?;
        }

        Ok(LoadOutcome { rows, preview })
    }

    /// Permanently remove rows that were soft-deleted more than `retention` ago
    pub async fn purge_deleted(&self, retention: chrono::Duration) -> Result<usize, SettingsError> {
        let cutoff = chrono::Utc::now() - retention;
        let expired = self.repo.find_deleted_before(cutoff).await?;
        if expired.is_empty() {
            return Ok(0);
        }

        let ids: Vec<_> = expired.iter().map(|r| r.id).collect();
        let purged = self.repo.hard_delete(&ids).await?;
        tracing::info!(purged, "Purged expired soft-deleted settings");
        Ok(purged as usize)
    }
}
