//! SeaORM repository implementation

use crate::contract::{SettingRecord, SettingsQuery};
use crate::domain::repository::SettingsRepository;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    prelude::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Select, SqlErr,
};
use std::sync::Arc;
use uuid::Uuid;

use super::entity;

/// Insert/update rounds before a unique-key conflict is reported
const UPSERT_ATTEMPTS: usize = 3;

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub struct SeaOrmSettingsRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmSettingsRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Live rows of one scope/facility pair
    fn live_rows(query: &SettingsQuery) -> Select<entity::Entity> {
        let select = entity::Entity::find()
            .filter(entity::Column::Scope.eq(query.scope.as_str()))
            .filter(entity::Column::DeletedAt.is_null());

        match &query.facility_id {
            Some(facility_id) => select.filter(entity::Column::FacilityId.eq(facility_id.as_str())),
            None => select.filter(entity::Column::FacilityId.is_null()),
        }
    }
}

#[async_trait]
impl SettingsRepository for SeaOrmSettingsRepository {
    async fn find_rows(&self, query: &SettingsQuery) -> Result<Vec<SettingRecord>> {
        let mut select = Self::live_rows(query);

        if let Some(key) = query.key.as_deref().filter(|k| !k.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(entity::Column::Key.eq(key))
                    .add(entity::Column::Key.starts_with(format!("{}.", key))),
            );
        }

        let results = select
            .order_by_asc(entity::Column::Key)
            .all(&*self.db)
            .await?;

        // LIKE treats `_` as a wildcard, so re-check the prefix exactly
        results
            .into_iter()
            .filter(|e| query.matches_key(&e.key))
            .map(SettingRecord::try_from)
            .collect()
    }

    async fn upsert(&self, record: &SettingRecord) -> Result<(SettingRecord, bool)> {
        use sea_orm::ActiveValue::Set;

        let query = SettingsQuery::key(record.key.clone(), record.scope, record.facility_id.clone());

        for attempt in 1..=UPSERT_ATTEMPTS {
            let existing = Self::live_rows(&query)
                .filter(entity::Column::Key.eq(record.key.as_str()))
                .one(&*self.db)
                .await?;

            if let Some(existing) = existing {
                let mut active = existing.into_active_model();
                active.value = Set(record.value.clone());
                active.updated_at = Set(Utc::now());
                let updated = active.update(&*self.db).await?;
                return Ok((updated.try_into()?, false));
            }

            let active: entity::ActiveModel = record.into();
            match entity::Entity::insert(active)
                .exec_with_returning(&*self.db)
                .await
            {
                Ok(inserted) => return Ok((inserted.try_into()?, true)),
                // Another writer created the live row first; update it instead
                Err(err) if is_unique_violation(&err) && attempt < UPSERT_ATTEMPTS => {
                    tracing::debug!(key = %record.key, attempt, "Concurrent insert of setting, retrying as update");
                }
                Err(err) => return Err(err.into()),
            }
        }

        anyhow::bail!("upsert of '{}' kept conflicting with concurrent writers", record.key)
    }

    async fn soft_delete(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = entity::Entity::update_many()
            .col_expr(entity::Column::DeletedAt, Expr::value(Utc::now()))
            .filter(entity::Column::Id.is_in(ids.iter().copied()))
            .filter(entity::Column::DeletedAt.is_null())
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected)
    }

    async fn find_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<SettingRecord>> {
        let results = entity::Entity::find()
            .filter(entity::Column::DeletedAt.is_not_null())
            .filter(entity::Column::DeletedAt.lt(cutoff))
            .order_by_asc(entity::Column::DeletedAt)
            .all(&*self.db)
            .await?;

        results.into_iter().map(SettingRecord::try_from).collect()
    }

    async fn hard_delete(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = entity::Entity::delete_many()
            .filter(entity::Column::Id.is_in(ids.iter().copied()))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected)
    }
}
