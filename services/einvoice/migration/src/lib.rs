use sea_orm_migration::prelude::*;

mod m20260301_000001_create_customers;
mod m20260301_000002_create_invoices;
mod m20260301_000003_create_invoice_items;
mod m20260301_000004_create_gst_settings;
mod m20260301_000005_create_gst_submission_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_customers::Migration),
            Box::new(m20260301_000002_create_invoices::Migration),
            Box::new(m20260301_000003_create_invoice_items::Migration),
            Box::new(m20260301_000004_create_gst_settings::Migration),
            Box::new(m20260301_000005_create_gst_submission_logs::Migration),
        ]
    }
}
