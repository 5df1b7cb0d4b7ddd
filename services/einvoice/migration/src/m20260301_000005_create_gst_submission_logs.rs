use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GstSubmissionLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GstSubmissionLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GstSubmissionLogs::InvoiceId).big_integer())
                    .col(
                        ColumnDef::new(GstSubmissionLogs::TransactionType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GstSubmissionLogs::Status).string().not_null())
                    .col(ColumnDef::new(GstSubmissionLogs::RequestPayload).json_binary())
                    .col(ColumnDef::new(GstSubmissionLogs::ResponsePayload).json_binary())
                    .col(ColumnDef::new(GstSubmissionLogs::ErrorDetails).json_binary())
                    .col(
                        ColumnDef::new(GstSubmissionLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // "Logs for invoice X" in chronological order.
        manager
            .create_index(
                Index::create()
                    .table(GstSubmissionLogs::Table)
                    .col(GstSubmissionLogs::InvoiceId)
                    .col(GstSubmissionLogs::CreatedAt)
                    .name("idx_gst_submission_logs_invoice_id_created_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GstSubmissionLogs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum GstSubmissionLogs {
    Table,
    Id,
    InvoiceId,
    TransactionType,
    Status,
    RequestPayload,
    ResponsePayload,
    ErrorDetails,
    CreatedAt,
}
