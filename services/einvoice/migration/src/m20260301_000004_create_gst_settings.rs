use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GstSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GstSettings::SettingKey)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GstSettings::SettingValue).text().not_null())
                    .col(
                        ColumnDef::new(GstSettings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GstSettings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum GstSettings {
    Table,
    SettingKey,
    SettingValue,
    UpdatedAt,
}
