use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gst_domain::id::InvoiceId;

use crate::domain::types::{
    CancellationDetails, InvoiceGstState, InvoiceStatus, LogStatus, SubmissionLogEntry,
    TransactionType,
};
use crate::error::GstServiceError;
use crate::state::AppState;
use crate::usecase::reconcile::ReconcileReport;
use crate::usecase::submission::SubmissionResult;

/// `{success, message, data}` envelope shared by the lifecycle operations.
#[derive(Debug, Serialize)]
pub struct OperationResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    pub invoice_id: InvoiceId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IrnData {
    pub irn: String,
    pub ack_no: String,
    pub ack_date: String,
    pub qr_code_url: Option<String>,
}

fn submission_response(result: SubmissionResult) -> OperationResponse<IrnData> {
    let message = if result.reconciled {
        "IRN already registered for this invoice; recorded locally"
    } else {
        "IRN generated successfully"
    };
    OperationResponse {
        success: true,
        message: message.to_owned(),
        data: IrnData {
            irn: result.irn.irn,
            ack_no: result.irn.ack_no,
            ack_date: result.irn.ack_date,
            qr_code_url: result.irn.qr_code_url,
        },
    }
}

// ── POST /gst/einvoice/submit ────────────────────────────────────────────────

pub async fn submit_invoice(
    State(state): State<AppState>,
    Json(body): Json<InvoiceRequest>,
) -> Result<Json<OperationResponse<IrnData>>, GstServiceError> {
    let result = state.orchestrator().submit(body.invoice_id).await?;
    Ok(Json(submission_response(result)))
}

// ── POST /gst/einvoice/retry ─────────────────────────────────────────────────

pub async fn retry_invoice(
    State(state): State<AppState>,
    Json(body): Json<InvoiceRequest>,
) -> Result<Json<OperationResponse<IrnData>>, GstServiceError> {
    let result = state.orchestrator().retry(body.invoice_id).await?;
    Ok(Json(submission_response(result)))
}

// ── POST /gst/einvoice/cancel ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub invoice_id: InvoiceId,
    pub reason: String,
    pub remarks: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelData {
    pub cancel_date: String,
}

pub async fn cancel_invoice(
    State(state): State<AppState>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<OperationResponse<CancelData>>, GstServiceError> {
    let CancellationDetails { cancel_date, .. } = state
        .orchestrator()
        .cancel(body.invoice_id, &body.reason, body.remarks.as_deref())
        .await?;
    Ok(Json(OperationResponse {
        success: true,
        message: "IRN cancelled successfully".to_owned(),
        data: CancelData { cancel_date },
    }))
}

// ── GET /gst/einvoice/{invoice_id} ───────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub invoice_id: InvoiceId,
    pub status: InvoiceStatus,
    pub irn: Option<String>,
    pub ack_no: Option<String>,
    pub ack_date: Option<String>,
    pub qr_code_url: Option<String>,
    pub cancel_date: Option<String>,
}

impl From<InvoiceGstState> for StatusResponse {
    fn from(s: InvoiceGstState) -> Self {
        Self {
            invoice_id: s.id,
            status: s.status,
            irn: s.irn,
            ack_no: s.ack_no,
            ack_date: s.ack_date,
            qr_code_url: s.qr_code_url,
            cancel_date: s.cancel_date,
        }
    }
}

pub async fn get_invoice_status(
    State(state): State<AppState>,
    Path(invoice_id): Path<InvoiceId>,
) -> Result<Json<StatusResponse>, GstServiceError> {
    let status = state.orchestrator().status(invoice_id).await?;
    Ok(Json(status.into()))
}

// ── GET /gst/einvoice/{invoice_id}/logs ──────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LogEntryResponse {
    pub id: i64,
    pub invoice_id: Option<InvoiceId>,
    pub transaction_type: TransactionType,
    pub status: LogStatus,
    pub request_payload: Option<serde_json::Value>,
    pub response_payload: Option<serde_json::Value>,
    pub error_details: Option<serde_json::Value>,
    #[serde(serialize_with = "gst_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl From<SubmissionLogEntry> for LogEntryResponse {
    fn from(e: SubmissionLogEntry) -> Self {
        Self {
            id: e.id,
            invoice_id: e.invoice_id,
            transaction_type: e.transaction_type,
            status: e.status,
            request_payload: e.request_payload,
            response_payload: e.response_payload,
            error_details: e.error_details,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<LogEntryResponse>,
}

pub async fn get_invoice_logs(
    State(state): State<AppState>,
    Path(invoice_id): Path<InvoiceId>,
) -> Result<Json<LogsResponse>, GstServiceError> {
    let logs = state.orchestrator().logs(invoice_id).await?;
    Ok(Json(LogsResponse {
        logs: logs.into_iter().map(Into::into).collect(),
    }))
}

// ── POST /gst/einvoice/reconcile ─────────────────────────────────────────────

pub async fn reconcile(
    State(state): State<AppState>,
) -> Result<Json<ReconcileReport>, GstServiceError> {
    let report = state.reconciler().execute().await?;
    Ok(Json(report))
}
