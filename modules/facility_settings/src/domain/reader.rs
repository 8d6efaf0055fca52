//! Uncached settings resolution for a scope context

use crate::contract::{ScopeContext, SettingsError, SettingsQuery, SettingsScope};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::builder::SettingsBuilder;
use super::key::validate_key;
use super::merge::{apply_records, deep_merge, lookup};
use super::store::SettingsStore;

/// Settings reader bound to one context.
///
/// Every call rebuilds the effective tree from the builder and the store;
/// use [`SettingsCache`](super::cache::SettingsCache) for request paths.
#[derive(Clone)]
pub struct ReadSettings {
    store: Arc<SettingsStore>,
    builder: Arc<dyn SettingsBuilder>,
    context: ScopeContext,
}

impl ReadSettings {
    pub fn new(
        store: Arc<SettingsStore>,
        builder: Arc<dyn SettingsBuilder>,
        context: ScopeContext,
    ) -> Self {
        Self {
            store,
            builder,
            context,
        }
    }

    pub fn context(&self) -> &ScopeContext {
        &self.context
    }

    /// Effective value at `key`; `None` when any segment is absent.
    /// The empty key returns the whole tree.
    pub async fn get(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        validate_key(key)?;
        let tree = self.build_tree().await?;
        Ok(lookup(&tree, key).cloned())
    }

    /// The whole effective tree
    pub async fn get_all(&self) -> Result<Value, SettingsError> {
        self.build_tree().await
    }

    /// Merge context seed ⊕ CENTRAL ⊕ GLOBAL ⊕ FACILITY into one tree
    pub async fn build_tree(&self) -> Result<Value, SettingsError> {
        let mut tree = Value::Object(Map::new());

        if let Some(tz) = &self.context.country_time_zone {
            tree["countryTimeZone"] = Value::String(tz.clone());
        }

        for scope in [SettingsScope::Central, SettingsScope::Global] {
            let layer = self.scope_tree(scope).await?;
            deep_merge(&mut tree, layer);
        }

        if let Some(facility_id) = &self.context.facility_id {
            let rows = self
                .store
                .find_rows(&SettingsQuery::scope(
                    SettingsScope::Facility,
                    Some(facility_id.clone()),
                ))
                .await?;
            apply_records(&mut tree, &rows);
        }

        Ok(tree)
    }

    /// File defaults for a scope with that scope's stored rows on top
    async fn scope_tree(&self, scope: SettingsScope) -> Result<Value, SettingsError> {
        let mut tree = self.builder.build(scope).await?;
        let rows = self
            .store
            .find_rows(&SettingsQuery::scope(scope, None))
            .await?;
        apply_records(&mut tree, &rows);
        Ok(tree)
    }
}
