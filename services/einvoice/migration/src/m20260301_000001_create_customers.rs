use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Customers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Customers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Customers::LegalName).string().not_null())
                    .col(ColumnDef::new(Customers::TradeName).string())
                    .col(ColumnDef::new(Customers::Gstin).string_len(15))
                    .col(ColumnDef::new(Customers::Address1).string().not_null())
                    .col(ColumnDef::new(Customers::Address2).string())
                    .col(ColumnDef::new(Customers::Location).string().not_null())
                    .col(ColumnDef::new(Customers::Pincode).integer().not_null())
                    .col(ColumnDef::new(Customers::StateCode).string_len(2).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Customers::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Customers {
    Table,
    Id,
    LegalName,
    TradeName,
    Gstin,
    Address1,
    Address2,
    Location,
    Pincode,
    StateCode,
}
