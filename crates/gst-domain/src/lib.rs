//! Domain types shared across the GST admin services.
//!
//! This crate contains only pure types with no framework dependencies.
//! Import in `usecase/` and `domain/` layers freely.

pub mod environment;
pub mod gstin;
pub mod id;
