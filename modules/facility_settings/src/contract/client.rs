//! Native client trait for inter-module communication
//!
//! This trait defines the API that request handlers and other modules use to
//! read and write settings. NO HTTP - direct function calls for performance.

use super::{
    error::SettingsError,
    model::{ScopeContext, SettingRecord, SettingsScope},
};
use async_trait::async_trait;

/// Facility settings API for inter-module communication
#[async_trait]
pub trait SettingsApi: Send + Sync {
    // ===== Reads =====

    /// Effective value of `key` for a context, served from the cache.
    /// `Ok(None)` means the key is undefined.
    async fn get(
        &self,
        key: &str,
        context: &ScopeContext,
    ) -> Result<Option<serde_json::Value>, SettingsError>;

    /// Value stored in a single scope, without defaults or layering
    async fn get_scoped(
        &self,
        key: &str,
        scope: SettingsScope,
        facility_id: Option<&str>,
    ) -> Result<Option<serde_json::Value>, SettingsError>;

    // ===== Writes =====

    /// Replace the subtree at `key` within a scope
    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        scope: SettingsScope,
        facility_id: Option<&str>,
    ) -> Result<Vec<SettingRecord>, SettingsError>;

    /// Remove the subtree at `key` within a scope, returning the number of rows removed
    async fn delete(
        &self,
        key: &str,
        scope: SettingsScope,
        facility_id: Option<&str>,
    ) -> Result<usize, SettingsError>;

    // ===== Cache =====

    /// Drop every cached settings tree
    fn reset_cache(&self);
}
