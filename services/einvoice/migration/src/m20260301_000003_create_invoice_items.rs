use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InvoiceItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InvoiceItems::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InvoiceItems::InvoiceId).big_integer().not_null())
                    .col(ColumnDef::new(InvoiceItems::SlNo).integer().not_null())
                    .col(ColumnDef::new(InvoiceItems::Description).string().not_null())
                    .col(ColumnDef::new(InvoiceItems::HsnCode).string_len(8).not_null())
                    .col(
                        ColumnDef::new(InvoiceItems::IsService)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(InvoiceItems::Quantity).double().not_null())
                    .col(ColumnDef::new(InvoiceItems::Unit).string_len(8).not_null())
                    .col(
                        ColumnDef::new(InvoiceItems::UnitPricePaise)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InvoiceItems::DiscountPaise)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(InvoiceItems::GstRate).double().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(InvoiceItems::Table, InvoiceItems::InvoiceId)
                            .to(Invoices::Table, Invoices::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(InvoiceItems::Table)
                    .col(InvoiceItems::InvoiceId)
                    .name("idx_invoice_items_invoice_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InvoiceItems::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum InvoiceItems {
    Table,
    Id,
    InvoiceId,
    SlNo,
    Description,
    HsnCode,
    IsService,
    Quantity,
    Unit,
    UnitPricePaise,
    DiscountPaise,
    GstRate,
}

#[derive(Iden)]
enum Invoices {
    Table,
    Id,
}
