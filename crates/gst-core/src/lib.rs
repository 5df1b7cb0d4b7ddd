//! Shared service plumbing for the GST admin services.

pub mod config;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
