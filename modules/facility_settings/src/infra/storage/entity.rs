//! SeaORM entity for the settings table

use sea_orm::entity::prelude::*;

/// Settings table entity
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    /// Row identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Dotted setting key, empty for a root-level override
    pub key: String,

    /// Setting value as JSON
    pub value: Json,

    /// Scope name (global, central, facility)
    pub scope: String,

    /// Facility the row applies to, set only for facility scope
    pub facility_id: Option<String>,

    /// Creation timestamp
    pub created_at: DateTimeUtc,

    /// Last update timestamp
    pub updated_at: DateTimeUtc,

    /// Soft delete timestamp
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
