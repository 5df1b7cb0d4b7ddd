use sea_orm::entity::prelude::*;

/// Tax invoice header with its e-invoice (IRN) state.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub invoice_no: String,
    pub invoice_date: Date,
    pub customer_id: i64,
    /// Place-of-supply state code; defaults to the buyer's state when null.
    pub place_of_supply: Option<String>,
    /// One of `draft`, `validated`, `submitted`, `cancelled`, `submission_failed`.
    pub status: String,
    #[sea_orm(unique)]
    pub irn: Option<String>,
    pub ack_no: Option<String>,
    pub ack_date: Option<String>,
    pub qr_code_url: Option<String>,
    pub cancel_date: Option<String>,
    /// Lease held while a submit/retry/cancel call is in flight.
    pub submission_lock_until: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::invoice_items::Entity")]
    InvoiceItems,
    #[sea_orm(
        belongs_to = "super::customers::Entity",
        from = "Column::CustomerId",
        to = "super::customers::Column::Id"
    )]
    Customer,
}

impl Related<super::invoice_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InvoiceItems.def()
    }
}

impl Related<super::customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
