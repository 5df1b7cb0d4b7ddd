use sea_orm::entity::prelude::*;

/// Line item of a tax invoice. Money columns are integer paise.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "invoice_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub invoice_id: i64,
    pub sl_no: i32,
    pub description: String,
    pub hsn_code: String,
    pub is_service: bool,
    pub quantity: f64,
    pub unit: String,
    pub unit_price_paise: i64,
    pub discount_paise: i64,
    /// GST rate in percent (e.g. `18.0`).
    pub gst_rate: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::invoices::Entity",
        from = "Column::InvoiceId",
        to = "super::invoices::Column::Id",
        on_delete = "Cascade"
    )]
    Invoice,
}

impl Related<super::invoices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
