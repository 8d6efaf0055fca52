use sea_orm_migration::prelude::*;

const INDEX: &str = "idx_settings_live_unique";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // NULL facility ids never collide in a plain unique index
        manager
            .get_connection()
            .execute_unprepared(&format!(
                r#"CREATE UNIQUE INDEX IF NOT EXISTS {INDEX} ON settings (scope, COALESCE(facility_id, ''), "key") WHERE deleted_at IS NULL"#
            ))
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(&format!("DROP INDEX IF EXISTS {INDEX}"))
            .await?;
        Ok(())
    }
}
