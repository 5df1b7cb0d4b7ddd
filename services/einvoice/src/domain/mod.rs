pub mod einvoice;
pub mod payload;
pub mod repository;
pub mod retry;
pub mod settings;
pub mod types;
