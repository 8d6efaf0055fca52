//! Native client implementation - wraps the store and cache for in-process calls

use crate::contract::{ScopeContext, SettingRecord, SettingsApi, SettingsError, SettingsScope};
use crate::domain::{SettingsCache, SettingsStore};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Native client that calls the domain layer directly.
///
/// Reads go through the cache; writes go through the store, which resets the
/// cache once they commit.
#[derive(Clone)]
pub struct NativeClient {
    store: Arc<SettingsStore>,
    cache: Arc<SettingsCache>,
}

impl NativeClient {
    pub fn new(store: Arc<SettingsStore>, cache: Arc<SettingsCache>) -> Self {
        Self { store, cache }
    }
}

#[async_trait]
impl SettingsApi for NativeClient {
    async fn get(&self, key: &str, context: &ScopeContext) -> Result<Option<Value>, SettingsError> {
        self.cache.get(key, context).await
    }

    async fn get_scoped(
        &self,
        key: &str,
        scope: SettingsScope,
        facility_id: Option<&str>,
    ) -> Result<Option<Value>, SettingsError> {
        self.store.get_scoped(key, scope, facility_id).await
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        scope: SettingsScope,
        facility_id: Option<&str>,
    ) -> Result<Vec<SettingRecord>, SettingsError> {
        self.store.set(key, value, scope, facility_id).await
    }

    async fn delete(
        &self,
        key: &str,
        scope: SettingsScope,
        facility_id: Option<&str>,
    ) -> Result<usize, SettingsError> {
        self.store.delete(key, scope, facility_id).await
    }

    fn reset_cache(&self) {
        self.cache.reset();
    }
}
