use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gst_domain::id::InvoiceId;

use crate::domain::types::{
    CancelReason, CancellationDetails, IrnDetails, MAX_CANCEL_REMARKS_CHARS,
};

/// One `{ErrorCode, ErrorMessage}` pair reported by the e-invoice system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Classified failure of a call to the e-invoice system.
#[derive(Debug, thiserror::Error)]
pub enum EinvoiceApiError {
    #[error("authentication rejected: {0}")]
    Authentication(String),
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("cancellation window expired")]
    CancellationWindowExpired(Vec<ApiErrorDetail>),
    /// The IRN for this document already exists remotely; `existing` carries
    /// its details when the system returned them.
    #[error("duplicate IRN")]
    DuplicateIrn {
        existing: Option<IrnDetails>,
        errors: Vec<ApiErrorDetail>,
    },
    #[error("request rejected")]
    Rejected(Vec<ApiErrorDetail>),
    #[error("unreadable response: {0}")]
    InvalidResponse(String),
}

/// Result of one API operation plus the raw response body for the audit log.
#[derive(Debug)]
pub struct ApiOutcome<T> {
    pub result: Result<T, EinvoiceApiError>,
    pub response_payload: Option<serde_json::Value>,
}

impl<T> ApiOutcome<T> {
    pub fn new(
        result: Result<T, EinvoiceApiError>,
        response_payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            result,
            response_payload,
        }
    }
}

/// Outcome of the connectivity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionResult {
    pub success: bool,
    pub message: String,
}

/// Body of the cancel-IRN request in the system's wire casing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelIrnRequest {
    #[serde(rename = "Irn")]
    pub irn: String,
    #[serde(rename = "CnlRsn")]
    pub reason_code: String,
    #[serde(rename = "CnlRem")]
    pub remarks: String,
}

impl CancelIrnRequest {
    /// Remarks default to the reason name and are cut to the accepted length.
    pub fn new(irn: &str, reason: CancelReason, remarks: Option<&str>) -> Self {
        let remarks = remarks
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(reason.as_str());
        Self {
            irn: irn.to_owned(),
            reason_code: reason.code().to_owned(),
            remarks: remarks.chars().take(MAX_CANCEL_REMARKS_CHARS).collect(),
        }
    }
}

/// Notification posted to the configured webhook after a state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub event: &'static str,
    pub invoice_id: InvoiceId,
    pub irn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_date: Option<String>,
    #[serde(serialize_with = "gst_core::serde::to_rfc3339_ms")]
    pub occurred_at: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn irn_generated(invoice_id: InvoiceId, details: &IrnDetails) -> Self {
        Self {
            event: "irn.generated",
            invoice_id,
            irn: details.irn.clone(),
            ack_no: Some(details.ack_no.clone()),
            ack_date: Some(details.ack_date.clone()),
            cancel_date: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn irn_cancelled(invoice_id: InvoiceId, details: &CancellationDetails) -> Self {
        Self {
            event: "irn.cancelled",
            invoice_id,
            irn: details.irn.clone(),
            ack_no: None,
            ack_date: None,
            cancel_date: Some(details.cancel_date.clone()),
            occurred_at: Utc::now(),
        }
    }
}
