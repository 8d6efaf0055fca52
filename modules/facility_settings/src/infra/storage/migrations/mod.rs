//! Database migrations for facility settings

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_settings::Migration),
            Box::new(m20250315_000002_unique_live_settings::Migration),
        ]
    }
}

mod m20250301_000001_create_settings;
mod m20250315_000002_unique_live_settings;
