#![allow(async_fn_in_trait)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use gst_domain::id::InvoiceId;

use crate::domain::einvoice::{ApiOutcome, CancelIrnRequest, ConnectionResult, WebhookEvent};
use crate::domain::payload::IrnPayload;
use crate::domain::settings::GstSettings;
use crate::domain::types::{
    CancellationDetails, ClaimKind, InvoiceDocument, InvoiceGstState, InvoiceStatus, IrnDetails,
    NewLogEntry, SubmissionLogEntry,
};
use crate::error::GstServiceError;

/// GST-related reads and writes on invoice rows.
pub trait InvoiceRepository: Send + Sync {
    async fn find_state(&self, id: InvoiceId)
    -> Result<Option<InvoiceGstState>, GstServiceError>;

    /// Invoice header, buyer and items. `None` if the invoice does not exist.
    async fn load_document(
        &self,
        id: InvoiceId,
    ) -> Result<Option<InvoiceDocument>, GstServiceError>;

    /// Atomically take the per-invoice lease for `kind`.
    ///
    /// Returns `false` if another operation holds a live lease or the invoice
    /// no longer satisfies the precondition of `kind`.
    async fn try_claim(
        &self,
        id: InvoiceId,
        kind: ClaimKind,
        lease_until: DateTime<Utc>,
    ) -> Result<bool, GstServiceError>;

    /// Persist IRN details, set `submitted` and release the lease.
    ///
    /// Returns `false` without writing if the invoice already has an IRN.
    async fn record_irn(&self, id: InvoiceId, details: &IrnDetails)
    -> Result<bool, GstServiceError>;

    /// Set `submission_failed` and release the lease (no-op once an IRN exists).
    async fn record_submission_failure(&self, id: InvoiceId) -> Result<(), GstServiceError>;

    /// Set `cancelled`, persist the cancel date and release the lease.
    async fn record_cancellation(
        &self,
        id: InvoiceId,
        details: &CancellationDetails,
    ) -> Result<(), GstServiceError>;

    /// Release the lease without changing status.
    async fn release_claim(&self, id: InvoiceId) -> Result<(), GstServiceError>;

    /// Up to `limit` ids in `status` greater than `after`, ascending.
    async fn list_ids_by_status(
        &self,
        status: InvoiceStatus,
        after: Option<InvoiceId>,
        limit: u64,
    ) -> Result<Vec<InvoiceId>, GstServiceError>;
}

/// Append-only audit trail of e-invoice API calls.
pub trait SubmissionLogRepository: Send + Sync {
    async fn append(&self, entry: &NewLogEntry) -> Result<(), GstServiceError>;

    /// Entries for one invoice, chronological.
    async fn list_by_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<SubmissionLogEntry>, GstServiceError>;
}

/// Raw key/value settings rows.
pub trait SettingsRepository: Send + Sync {
    async fn load_all(&self) -> Result<HashMap<String, String>, GstServiceError>;
    async fn upsert_many(&self, pairs: &[(&str, String)]) -> Result<(), GstServiceError>;
}

/// Look-aside cache of the validated settings snapshot.
///
/// Snapshots are stored per generation. A reader reads the generation before
/// loading the table and writes back under that generation, so a snapshot
/// loaded before an invalidation is never served after it.
pub trait SettingsCache: Send + Sync {
    async fn generation(&self) -> Result<u64, GstServiceError>;
    async fn get(&self, generation: u64) -> Result<Option<GstSettings>, GstServiceError>;
    async fn put(&self, generation: u64, settings: &GstSettings) -> Result<(), GstServiceError>;
    /// Advance the generation, orphaning every snapshot written so far.
    async fn invalidate(&self) -> Result<(), GstServiceError>;
}

/// Source of the settings in effect for the next external call.
pub trait SettingsProvider: Send + Sync {
    async fn current(&self) -> Result<GstSettings, GstServiceError>;
}

/// Government e-invoice system.
pub trait EinvoicePort: Send + Sync {
    async fn test_connection(&self, settings: &GstSettings) -> ApiOutcome<ConnectionResult>;

    async fn generate_irn(
        &self,
        settings: &GstSettings,
        payload: &IrnPayload,
    ) -> ApiOutcome<IrnDetails>;

    async fn cancel_irn(
        &self,
        settings: &GstSettings,
        request: &CancelIrnRequest,
    ) -> ApiOutcome<CancellationDetails>;

    /// Best-effort notification; failures are logged, never returned.
    async fn notify_webhook(&self, settings: &GstSettings, event: &WebhookEvent);
}
