pub mod einvoice;
pub mod health;
pub mod settings;
