//! Entity to model mappers
//!
//! Conversions between the SeaORM entity and contract models

use super::entity;
use crate::contract::{SettingRecord, SettingsScope};
use anyhow::Context;

impl TryFrom<entity::Model> for SettingRecord {
    type Error = anyhow::Error;

    fn try_from(entity: entity::Model) -> Result<Self, Self::Error> {
        let scope: SettingsScope = entity
            .scope
            .parse()
            .with_context(|| format!("setting row {} has an unknown scope", entity.id))?;

        Ok(Self {
            id: entity.id,
            key: entity.key,
            value: entity.value,
            scope,
            facility_id: entity.facility_id,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
            deleted_at: entity.deleted_at,
        })
    }
}

impl From<&SettingRecord> for entity::ActiveModel {
    fn from(model: &SettingRecord) -> Self {
        use sea_orm::ActiveValue::*;

        Self {
            id: Set(model.id),
            key: Set(model.key.clone()),
            value: Set(model.value.clone()),
            scope: Set(model.scope.as_str().to_string()),
            facility_id: Set(model.facility_id.clone()),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
            deleted_at: Set(model.deleted_at),
        }
    }
}
