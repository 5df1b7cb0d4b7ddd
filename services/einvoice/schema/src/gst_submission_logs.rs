use sea_orm::entity::prelude::*;

/// Append-only audit record of one call to the e-invoice API.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "gst_submission_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Null for calls not tied to an invoice (test connection).
    pub invoice_id: Option<i64>,
    /// `submit`, `cancel`, `retry` or `test_connection`.
    pub transaction_type: String,
    /// `success`, `failure` or `pending`.
    pub status: String,
    pub request_payload: Option<Json>,
    pub response_payload: Option<Json>,
    pub error_details: Option<Json>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
