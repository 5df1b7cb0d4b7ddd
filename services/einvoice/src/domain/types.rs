use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use gst_domain::id::InvoiceId;

use crate::error::GstServiceError;

// ── Invoice status ───────────────────────────────────────────────────────────

/// E-invoice lifecycle status persisted on the invoice row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Validated,
    Submitted,
    Cancelled,
    SubmissionFailed,
}

impl InvoiceStatus {
    pub const ALL: [Self; 5] = [
        Self::Draft,
        Self::Validated,
        Self::Submitted,
        Self::Cancelled,
        Self::SubmissionFailed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Validated => "validated",
            Self::Submitted => "submitted",
            Self::Cancelled => "cancelled",
            Self::SubmissionFailed => "submission_failed",
        }
    }

    /// Statuses from which `submit` may start.
    pub fn is_submittable(self) -> bool {
        matches!(
            self,
            Self::Draft | Self::Validated | Self::SubmissionFailed
        )
    }

    /// Statuses that require a non-null IRN.
    pub fn carries_irn(self) -> bool {
        matches!(self, Self::Submitted | Self::Cancelled)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = GstServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "validated" => Ok(Self::Validated),
            "submitted" => Ok(Self::Submitted),
            "cancelled" => Ok(Self::Cancelled),
            "submission_failed" => Ok(Self::SubmissionFailed),
            other => Err(GstServiceError::Internal(anyhow::anyhow!(
                "unknown invoice status {other:?}"
            ))),
        }
    }
}

// ── Invoice GST state ────────────────────────────────────────────────────────

/// The GST-related subset of an invoice row.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceGstState {
    pub id: InvoiceId,
    pub status: InvoiceStatus,
    pub irn: Option<String>,
    pub ack_no: Option<String>,
    pub ack_date: Option<String>,
    pub qr_code_url: Option<String>,
    pub cancel_date: Option<String>,
    pub lock_until: Option<DateTime<Utc>>,
}

/// Registration result returned by the e-invoice system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrnDetails {
    pub irn: String,
    pub ack_no: String,
    pub ack_date: String,
    pub qr_code_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationDetails {
    pub irn: String,
    pub cancel_date: String,
}

/// Which in-flight operation holds the invoice lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    /// submit/retry: claimable while the invoice has no IRN.
    Submission,
    /// cancel: claimable while the invoice is `submitted`.
    Cancellation,
}

// ── Audit log ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Submit,
    Cancel,
    Retry,
    TestConnection,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Cancel => "cancel",
            Self::Retry => "retry",
            Self::TestConnection => "test_connection",
        }
    }
}

impl FromStr for TransactionType {
    type Err = GstServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submit" => Ok(Self::Submit),
            "cancel" => Ok(Self::Cancel),
            "retry" => Ok(Self::Retry),
            "test_connection" => Ok(Self::TestConnection),
            other => Err(GstServiceError::Internal(anyhow::anyhow!(
                "unknown transaction type {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Failure,
    Pending,
}

impl LogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Pending => "pending",
        }
    }
}

impl FromStr for LogStatus {
    type Err = GstServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "pending" => Ok(Self::Pending),
            other => Err(GstServiceError::Internal(anyhow::anyhow!(
                "unknown log status {other:?}"
            ))),
        }
    }
}

/// Whether a failed call is worth repeating unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Transient,
    Permanent,
}

/// One persisted audit record.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionLogEntry {
    pub id: i64,
    pub invoice_id: Option<InvoiceId>,
    pub transaction_type: TransactionType,
    pub status: LogStatus,
    pub request_payload: Option<serde_json::Value>,
    pub response_payload: Option<serde_json::Value>,
    pub error_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl SubmissionLogEntry {
    /// Failure class recorded in `error_details`, if any.
    pub fn failure_class(&self) -> Option<FailureClass> {
        self.error_details
            .as_ref()
            .and_then(|d| d.get("class"))
            .and_then(|c| serde_json::from_value(c.clone()).ok())
    }
}

/// An audit record about to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLogEntry {
    pub invoice_id: Option<InvoiceId>,
    pub transaction_type: TransactionType,
    pub status: LogStatus,
    pub request_payload: Option<serde_json::Value>,
    pub response_payload: Option<serde_json::Value>,
    pub error_details: Option<serde_json::Value>,
}

impl NewLogEntry {
    pub fn success(
        invoice_id: Option<InvoiceId>,
        transaction_type: TransactionType,
        request_payload: Option<serde_json::Value>,
        response_payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            invoice_id,
            transaction_type,
            status: LogStatus::Success,
            request_payload,
            response_payload,
            error_details: None,
        }
    }

    pub fn failure(
        invoice_id: Option<InvoiceId>,
        transaction_type: TransactionType,
        request_payload: Option<serde_json::Value>,
        response_payload: Option<serde_json::Value>,
        error: &GstServiceError,
    ) -> Self {
        Self {
            invoice_id,
            transaction_type,
            status: LogStatus::Failure,
            request_payload,
            response_payload,
            error_details: Some(error.to_details()),
        }
    }
}

// ── Invoice document ─────────────────────────────────────────────────────────

/// Persisted invoice data the IRN payload is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDocument {
    pub id: InvoiceId,
    pub invoice_no: String,
    pub invoice_date: NaiveDate,
    pub place_of_supply: Option<String>,
    pub buyer: BuyerDetails,
    pub lines: Vec<InvoiceLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuyerDetails {
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub gstin: Option<String>,
    pub address1: String,
    pub address2: Option<String>,
    pub location: String,
    pub pincode: u32,
    pub state_code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceLine {
    pub sl_no: u32,
    pub description: String,
    pub hsn_code: String,
    pub is_service: bool,
    pub quantity: f64,
    pub unit: String,
    pub unit_price_paise: i64,
    pub discount_paise: i64,
    pub gst_rate: f64,
}

// ── Cancellation reason ──────────────────────────────────────────────────────

/// Reason codes accepted by the cancel endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Duplicate,
    DataEntryMistake,
    OrderCancelled,
    Other,
}

impl CancelReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::Duplicate => "1",
            Self::DataEntryMistake => "2",
            Self::OrderCancelled => "3",
            Self::Other => "4",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::DataEntryMistake => "data_entry_mistake",
            Self::OrderCancelled => "order_cancelled",
            Self::Other => "other",
        }
    }

    /// Accepts a numeric code or a reason name (case, spaces and dashes ignored).
    pub fn parse(input: &str) -> Result<Self, GstServiceError> {
        let normalized = input.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "" => Err(GstServiceError::Validation(
                "cancellation reason is required".to_owned(),
            )),
            "1" | "duplicate" => Ok(Self::Duplicate),
            "2" | "data_entry_mistake" => Ok(Self::DataEntryMistake),
            "3" | "order_cancelled" => Ok(Self::OrderCancelled),
            "4" | "other" => Ok(Self::Other),
            _ => Err(GstServiceError::Validation(format!(
                "unknown cancellation reason {input:?}"
            ))),
        }
    }
}

/// Longest remark accepted by the cancel endpoint.
pub const MAX_CANCEL_REMARKS_CHARS: usize = 100;
