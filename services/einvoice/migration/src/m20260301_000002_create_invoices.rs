use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Invoices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Invoices::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Invoices::InvoiceNo).string_len(16).not_null())
                    .col(ColumnDef::new(Invoices::InvoiceDate).date().not_null())
                    .col(ColumnDef::new(Invoices::CustomerId).big_integer().not_null())
                    .col(ColumnDef::new(Invoices::PlaceOfSupply).string_len(2))
                    .col(
                        ColumnDef::new(Invoices::Status)
                            .string()
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(Invoices::Irn).string_len(64).unique_key())
                    .col(ColumnDef::new(Invoices::AckNo).string())
                    .col(ColumnDef::new(Invoices::AckDate).string())
                    .col(ColumnDef::new(Invoices::QrCodeUrl).text())
                    .col(ColumnDef::new(Invoices::CancelDate).string())
                    .col(ColumnDef::new(Invoices::SubmissionLockUntil).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Invoices::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Invoices::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Invoices::Table, Invoices::CustomerId)
                            .to(Customers::Table, Customers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Reconciliation pass scans by status.
        manager
            .create_index(
                Index::create()
                    .table(Invoices::Table)
                    .col(Invoices::Status)
                    .name("idx_invoices_status")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Invoices::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Invoices {
    Table,
    Id,
    InvoiceNo,
    InvoiceDate,
    CustomerId,
    PlaceOfSupply,
    Status,
    Irn,
    AckNo,
    AckDate,
    QrCodeUrl,
    CancelDate,
    SubmissionLockUntil,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Customers {
    Table,
    Id,
}
