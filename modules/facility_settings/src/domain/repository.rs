//! Repository trait for data access
//!
//! This trait defines the interface for settings persistence.
//! The SeaORM implementation is in infra/storage/repositories.rs

use crate::contract::{SettingRecord, SettingsQuery};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository for setting records
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Live (not soft-deleted) rows matching a query
    async fn find_rows(&self, query: &SettingsQuery) -> Result<Vec<SettingRecord>>;

    /// Create or update the row identified by (key, scope, facility_id).
    /// Returns the stored record and whether it was newly created.
    async fn upsert(&self, record: &SettingRecord) -> Result<(SettingRecord, bool)>;

    /// Soft delete rows by id, returning how many were affected
    async fn soft_delete(&self, ids: &[Uuid]) -> Result<u64>;

    /// Soft-deleted rows whose deletion happened before `cutoff`
    async fn find_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<SettingRecord>>;

    /// Permanently remove rows by id
    async fn hard_delete(&self, ids: &[Uuid]) -> Result<u64>;
}
