//! sea-orm entities for the tables the e-invoice engine reads and writes.
//!
//! `invoices`, `invoice_items` and `customers` belong to the admin application;
//! only the GST columns of `invoices` are written here.

pub mod customers;
pub mod gst_settings;
pub mod gst_submission_logs;
pub mod invoice_items;
pub mod invoices;
