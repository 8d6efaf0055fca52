use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Settings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Settings::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Settings::Key).string_len(255).not_null())
                    .col(ColumnDef::new(Settings::Value).json().not_null())
                    .col(ColumnDef::new(Settings::Scope).string_len(16).not_null())
                    .col(ColumnDef::new(Settings::FacilityId).string())
                    .col(
                        ColumnDef::new(Settings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Settings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Settings::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_settings_scope_facility_key")
                    .table(Settings::Table)
                    .col(Settings::Scope)
                    .col(Settings::FacilityId)
                    .col(Settings::Key)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_settings_deleted_at")
                    .table(Settings::Table)
                    .col(Settings::DeletedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Settings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Settings {
    Table,
    Id,
    Key,
    Value,
    Scope,
    FacilityId,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}
