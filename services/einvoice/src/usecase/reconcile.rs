use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use gst_domain::id::InvoiceId;

use crate::domain::repository::{
    EinvoicePort, InvoiceRepository, SettingsProvider, SubmissionLogRepository,
};
use crate::domain::retry::{RetryDecision, RetryPolicy};
use crate::domain::types::{
    FailureClass, InvoiceStatus, LogStatus, SubmissionLogEntry, TransactionType,
};
use crate::error::GstServiceError;
use crate::usecase::submission::SubmissionOrchestrator;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub examined: u32,
    pub retried: u32,
    pub submitted: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// One pass over invoices awaiting an automatic submission attempt.
///
/// Meant to be triggered by an external scheduler; nothing here loops.
pub struct ReconcileUseCase<I, L, S, A>
where
    I: InvoiceRepository,
    L: SubmissionLogRepository,
    S: SettingsProvider,
    A: EinvoicePort,
{
    pub orchestrator: SubmissionOrchestrator<I, L, S, A>,
    pub policy: RetryPolicy,
    pub batch_size: u64,
}

impl<I, L, S, A> ReconcileUseCase<I, L, S, A>
where
    I: InvoiceRepository,
    L: SubmissionLogRepository,
    S: SettingsProvider,
    A: EinvoicePort,
{
    /// Each phase pages through every candidate in id order, so invoices a
    /// pass leaves alone never hide the ones behind them. Per phase, at most
    /// `batch_size` attempts get past local validation.
    pub async fn execute(&self) -> Result<ReconcileReport, GstServiceError> {
        let settings = self.orchestrator.settings.current().await?;
        let now = Utc::now();
        let mut report = ReconcileReport::default();

        let mut cursor = Cursor::new(InvoiceStatus::SubmissionFailed);
        let mut attempts = 0;
        while attempts < self.batch_size {
            let Some(id) = cursor.next(&self.orchestrator.invoices, self.batch_size).await? else {
                break;
            };
            report.examined += 1;
            let history = self.orchestrator.logs.list_by_invoice(id).await?;
            if !retry_due(&self.policy, &history, settings.retry_attempts, now) {
                report.skipped += 1;
                continue;
            }
            let outcome = self.orchestrator.retry(id).await;
            if reached_remote(&outcome) {
                attempts += 1;
            }
            match outcome {
                Ok(_) => report.retried += 1,
                Err(e) if is_contended(&e) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(invoice_id = %id, kind = e.kind(), "automatic retry failed");
                    report.failed += 1;
                }
            }
        }

        if settings.auto_submit_invoices {
            let mut cursor = Cursor::new(InvoiceStatus::Validated);
            let mut attempts = 0;
            while attempts < self.batch_size {
                let Some(id) = cursor.next(&self.orchestrator.invoices, self.batch_size).await?
                else {
                    break;
                };
                report.examined += 1;
                let outcome = self.orchestrator.submit(id).await;
                if reached_remote(&outcome) {
                    attempts += 1;
                }
                match outcome {
                    Ok(_) => report.submitted += 1,
                    Err(e) if is_contended(&e) => report.skipped += 1,
                    Err(e) => {
                        tracing::warn!(
                            invoice_id = %id,
                            kind = e.kind(),
                            "automatic submission failed"
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            retried = report.retried,
            submitted = report.submitted,
            skipped = report.skipped,
            failed = report.failed,
            "reconciliation pass finished"
        );
        Ok(report)
    }
}

/// Keyset pagination over the ids in one status.
struct Cursor {
    status: InvoiceStatus,
    page: VecDeque<InvoiceId>,
    after: Option<InvoiceId>,
    exhausted: bool,
}

impl Cursor {
    fn new(status: InvoiceStatus) -> Self {
        Self {
            status,
            page: VecDeque::new(),
            after: None,
            exhausted: false,
        }
    }

    async fn next<I: InvoiceRepository>(
        &mut self,
        invoices: &I,
        page_size: u64,
    ) -> Result<Option<InvoiceId>, GstServiceError> {
        if self.page.is_empty() && !self.exhausted && page_size > 0 {
            let page = invoices
                .list_ids_by_status(self.status, self.after, page_size)
                .await?;
            self.exhausted = (page.len() as u64) < page_size;
            self.after = page.last().copied().or(self.after);
            self.page = page.into();
        }
        Ok(self.page.pop_front())
    }
}

/// Local validation failures are rejected before any call goes out.
fn reached_remote<T>(outcome: &Result<T, GstServiceError>) -> bool {
    !matches!(outcome, Err(GstServiceError::Validation(_)))
}

/// Another request got to the invoice first.
fn is_contended(err: &GstServiceError) -> bool {
    matches!(
        err,
        GstServiceError::AlreadySubmitted
            | GstServiceError::SubmissionInProgress
            | GstServiceError::InvalidState(_)
    )
}

/// Whether the backoff since the last failed submission has elapsed.
///
/// Only the trailing run of failed submit/retry entries counts; the first
/// of them is the original attempt, the rest are retries.
pub fn retry_due(
    policy: &RetryPolicy,
    history: &[SubmissionLogEntry],
    max_attempts: u32,
    now: DateTime<Utc>,
) -> bool {
    let failures: Vec<&SubmissionLogEntry> = history
        .iter()
        .filter(|e| {
            matches!(
                e.transaction_type,
                TransactionType::Submit | TransactionType::Retry
            )
        })
        .rev()
        .take_while(|e| e.status == LogStatus::Failure)
        .collect();
    let Some(last) = failures.first() else {
        return false;
    };

    let attempt = u32::try_from(failures.len() - 1).unwrap_or(u32::MAX);
    let class = last.failure_class().unwrap_or(FailureClass::Permanent);
    match policy.decide(attempt, max_attempts, class) {
        RetryDecision::GiveUp => false,
        RetryDecision::RetryAfter(delay) => TimeDelta::from_std(delay)
            .ok()
            .and_then(|delay| last.created_at.checked_add_signed(delay))
            .is_some_and(|due| due <= now),
    }
}
