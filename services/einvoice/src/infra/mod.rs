pub mod cache;
pub mod db;
pub mod einvoice_api;
pub mod rate_limit;
pub mod token;
