use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use gst_domain::id::InvoiceId;

use crate::domain::einvoice::{CancelIrnRequest, EinvoiceApiError, WebhookEvent};
use crate::domain::payload::build_irn_payload;
use crate::domain::repository::{
    EinvoicePort, InvoiceRepository, SettingsProvider, SubmissionLogRepository,
};
use crate::domain::settings::GstSettings;
use crate::domain::types::{
    CancelReason, CancellationDetails, ClaimKind, InvoiceGstState, InvoiceStatus, IrnDetails,
    NewLogEntry, SubmissionLogEntry, TransactionType,
};
use crate::error::GstServiceError;

/// Slack added to every lease on top of the worst-case call duration.
const LEASE_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub invoice_id: InvoiceId,
    pub irn: IrnDetails,
    /// The IRN was already registered remotely and has been adopted.
    pub reconciled: bool,
}

/// One external call on behalf of an invoice, as it will appear in the audit log.
struct Attempt {
    invoice_id: InvoiceId,
    transaction_type: TransactionType,
    request: Value,
}

impl Attempt {
    fn success(&self, response: Option<Value>) -> NewLogEntry {
        NewLogEntry::success(
            Some(self.invoice_id),
            self.transaction_type,
            Some(self.request.clone()),
            response,
        )
    }

    fn failure(&self, response: Option<Value>, error: &GstServiceError) -> NewLogEntry {
        NewLogEntry::failure(
            Some(self.invoice_id),
            self.transaction_type,
            Some(self.request.clone()),
            response,
            error,
        )
    }
}

// ── SubmissionOrchestrator ───────────────────────────────────────────────────

/// Drives the e-invoice lifecycle of a single invoice.
///
/// Every state-changing path claims the invoice lease before it calls out,
/// so concurrent requests for one invoice reach the e-invoice system at most
/// once. Results are written back with guarded updates that release the lease.
pub struct SubmissionOrchestrator<I, L, S, A>
where
    I: InvoiceRepository,
    L: SubmissionLogRepository,
    S: SettingsProvider,
    A: EinvoicePort,
{
    pub invoices: I,
    pub logs: L,
    pub settings: S,
    pub api: A,
    pub rate_limit_max_wait: Duration,
}

impl<I, L, S, A> SubmissionOrchestrator<I, L, S, A>
where
    I: InvoiceRepository,
    L: SubmissionLogRepository,
    S: SettingsProvider,
    A: EinvoicePort,
{
    pub async fn submit(&self, id: InvoiceId) -> Result<SubmissionResult, GstServiceError> {
        self.drive(id, TransactionType::Submit).await
    }

    /// User-triggered resubmission of a `submission_failed` invoice.
    pub async fn retry(&self, id: InvoiceId) -> Result<SubmissionResult, GstServiceError> {
        let state = self.state(id).await?;
        if state.irn.is_some() || state.status.carries_irn() {
            return Err(GstServiceError::AlreadySubmitted);
        }
        if state.status != InvoiceStatus::SubmissionFailed {
            return Err(GstServiceError::InvalidState(format!(
                "only submission_failed invoices can be retried (status: {})",
                state.status
            )));
        }
        self.drive(id, TransactionType::Retry).await
    }

    pub async fn cancel(
        &self,
        id: InvoiceId,
        reason: &str,
        remarks: Option<&str>,
    ) -> Result<CancellationDetails, GstServiceError> {
        let reason = CancelReason::parse(reason)?;
        let state = self.state(id).await?;
        let irn = match (state.status, state.irn) {
            (InvoiceStatus::Submitted, Some(irn)) => irn,
            (InvoiceStatus::Cancelled, _) => {
                return Err(GstServiceError::InvalidState(
                    "invoice is already cancelled".to_owned(),
                ));
            }
            (status, _) => {
                return Err(GstServiceError::InvalidState(format!(
                    "only submitted invoices can be cancelled (status: {status})"
                )));
            }
        };

        let settings = self.settings.current().await?;
        let request = CancelIrnRequest::new(&irn, reason, remarks);
        let attempt = Attempt {
            invoice_id: id,
            transaction_type: TransactionType::Cancel,
            request: serde_json::to_value(&request).context("serialize cancel request")?,
        };

        let claimed = self
            .invoices
            .try_claim(id, ClaimKind::Cancellation, self.lease_until(&settings))
            .await?;
        if !claimed {
            let state = self.state(id).await?;
            return Err(match state.status {
                InvoiceStatus::Cancelled => {
                    GstServiceError::InvalidState("invoice is already cancelled".to_owned())
                }
                _ => GstServiceError::SubmissionInProgress,
            });
        }

        let outcome = self.api.cancel_irn(&settings, &request).await;
        match outcome.result {
            Ok(details) => {
                if let Err(e) = self.invoices.record_cancellation(id, &details).await {
                    tracing::error!(
                        invoice_id = %id,
                        irn = %irn,
                        error = %e,
                        "failed to persist cancellation"
                    );
                    self.append_best_effort(&attempt.success(outcome.response_payload))
                        .await;
                    return Err(e);
                }
                self.logs
                    .append(&attempt.success(outcome.response_payload))
                    .await?;
                tracing::info!(
                    invoice_id = %id,
                    transaction_type = attempt.transaction_type.as_str(),
                    irn = %irn,
                    cancel_date = %details.cancel_date,
                    "IRN cancelled"
                );
                self.api
                    .notify_webhook(&settings, &WebhookEvent::irn_cancelled(id, &details))
                    .await;
                Ok(details)
            }
            Err(e) => {
                let err = GstServiceError::from(e);
                self.invoices.release_claim(id).await?;
                tracing::warn!(
                    invoice_id = %id,
                    transaction_type = attempt.transaction_type.as_str(),
                    kind = err.kind(),
                    error = %err,
                    "IRN cancellation failed"
                );
                self.logs
                    .append(&attempt.failure(outcome.response_payload, &err))
                    .await?;
                Err(err)
            }
        }
    }

    /// Audit entries for an invoice, oldest first.
    pub async fn logs(&self, id: InvoiceId) -> Result<Vec<SubmissionLogEntry>, GstServiceError> {
        self.state(id).await?;
        self.logs.list_by_invoice(id).await
    }

    pub async fn status(&self, id: InvoiceId) -> Result<InvoiceGstState, GstServiceError> {
        self.state(id).await
    }

    async fn state(&self, id: InvoiceId) -> Result<InvoiceGstState, GstServiceError> {
        self.invoices
            .find_state(id)
            .await?
            .ok_or(GstServiceError::InvoiceNotFound)
    }

    async fn drive(
        &self,
        id: InvoiceId,
        transaction_type: TransactionType,
    ) -> Result<SubmissionResult, GstServiceError> {
        let state = self.state(id).await?;
        if state.irn.is_some() || state.status.carries_irn() {
            tracing::info!(
                invoice_id = %id,
                transaction_type = transaction_type.as_str(),
                "invoice already has an IRN"
            );
            return Err(GstServiceError::AlreadySubmitted);
        }

        let settings = self.settings.current().await?;
        let document = self
            .invoices
            .load_document(id)
            .await?
            .ok_or(GstServiceError::InvoiceNotFound)?;
        let payload = build_irn_payload(&settings, &document)?;
        let attempt = Attempt {
            invoice_id: id,
            transaction_type,
            request: serde_json::to_value(&payload).context("serialize IRN payload")?,
        };

        let claimed = self
            .invoices
            .try_claim(id, ClaimKind::Submission, self.lease_until(&settings))
            .await?;
        if !claimed {
            let state = self.state(id).await?;
            return Err(if state.irn.is_some() {
                GstServiceError::AlreadySubmitted
            } else {
                GstServiceError::SubmissionInProgress
            });
        }

        let outcome = self.api.generate_irn(&settings, &payload).await;
        match outcome.result {
            Ok(details) => {
                let response = outcome.response_payload;
                self.complete_submission(&settings, &attempt, details, false, response)
                    .await
            }
            Err(EinvoiceApiError::DuplicateIrn {
                existing: Some(details),
                ..
            }) => {
                tracing::warn!(
                    invoice_id = %id,
                    irn = %details.irn,
                    "IRN already registered for this document, adopting it"
                );
                let response = outcome.response_payload;
                self.complete_submission(&settings, &attempt, details, true, response)
                    .await
            }
            Err(e) => {
                let err = GstServiceError::from(e);
                self.invoices.record_submission_failure(id).await?;
                tracing::warn!(
                    invoice_id = %id,
                    transaction_type = transaction_type.as_str(),
                    kind = err.kind(),
                    error = %err,
                    "IRN generation failed"
                );
                self.logs
                    .append(&attempt.failure(outcome.response_payload, &err))
                    .await?;
                Err(err)
            }
        }
    }

    async fn complete_submission(
        &self,
        settings: &GstSettings,
        attempt: &Attempt,
        details: IrnDetails,
        reconciled: bool,
        response: Option<Value>,
    ) -> Result<SubmissionResult, GstServiceError> {
        let id = attempt.invoice_id;
        match self.invoices.record_irn(id, &details).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(
                    invoice_id = %id,
                    irn = %details.irn,
                    "IRN issued for an invoice that already has one"
                );
                let err = GstServiceError::AlreadySubmitted;
                self.logs.append(&attempt.failure(response, &err)).await?;
                return Err(err);
            }
            Err(e) => {
                // The IRN exists remotely; the next retry adopts it through the duplicate path.
                tracing::error!(
                    invoice_id = %id,
                    irn = %details.irn,
                    error = %e,
                    "failed to persist IRN"
                );
                self.append_best_effort(&attempt.success(response)).await;
                return Err(e);
            }
        }

        self.logs.append(&attempt.success(response)).await?;
        tracing::info!(
            invoice_id = %id,
            transaction_type = attempt.transaction_type.as_str(),
            irn = %details.irn,
            reconciled,
            "IRN generated"
        );
        self.api
            .notify_webhook(settings, &WebhookEvent::irn_generated(id, &details))
            .await;
        Ok(SubmissionResult {
            invoice_id: id,
            irn: details,
            reconciled,
        })
    }

    async fn append_best_effort(&self, entry: &NewLogEntry) {
        if let Err(e) = self.logs.append(entry).await {
            tracing::error!(
                invoice_id = ?entry.invoice_id.map(|id| id.0),
                error = %e,
                "failed to append submission log"
            );
        }
    }

    fn lease_until(&self, settings: &GstSettings) -> DateTime<Utc> {
        let hold = lease_duration(self.rate_limit_max_wait, settings.request_timeout());
        let now = Utc::now();
        TimeDelta::from_std(hold)
            .ok()
            .and_then(|hold| now.checked_add_signed(hold))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Worst case of one external operation: up to two passes (the second after a
/// rejected token), each a token exchange and the call itself, every one of
/// them behind a full rate-limit wait and running to its timeout.
fn lease_duration(rate_limit_max_wait: Duration, request_timeout: Duration) -> Duration {
    rate_limit_max_wait
        .saturating_add(request_timeout)
        .saturating_mul(4)
        .saturating_add(LEASE_GRACE)
}
