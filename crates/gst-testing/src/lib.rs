//! Test utilities for the GST services.
//!
//! Provides `StubEinvoiceApi` and the contract fixture loader.
//! Import from tests only, never from production code.

pub mod fixture;
pub mod stub_api;
