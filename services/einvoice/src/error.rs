use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::domain::einvoice::{ApiErrorDetail, EinvoiceApiError};
use crate::domain::types::FailureClass;

/// E-invoice service error variants.
#[derive(Debug, thiserror::Error)]
pub enum GstServiceError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invoice not found")]
    InvoiceNotFound,
    #[error("invoice already submitted")]
    AlreadySubmitted,
    #[error("another operation is in progress for this invoice")]
    SubmissionInProgress,
    #[error("invalid invoice state: {0}")]
    InvalidState(String),
    #[error("authentication with the e-invoice system failed: {0}")]
    Authentication(String),
    #[error("outbound rate limit exceeded")]
    RateLimitExceeded,
    #[error("e-invoice system unreachable: {0}")]
    TransientNetwork(String),
    #[error("cancellation window expired")]
    CancellationWindowExpired(Vec<ApiErrorDetail>),
    #[error("rejected by the e-invoice system")]
    PermanentRemote(Vec<ApiErrorDetail>),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl GstServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvoiceNotFound => "INVOICE_NOT_FOUND",
            Self::AlreadySubmitted => "ALREADY_SUBMITTED",
            Self::SubmissionInProgress => "SUBMISSION_IN_PROGRESS",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Authentication(_) => "AUTHENTICATION_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::TransientNetwork(_) => "TRANSIENT_NETWORK_ERROR",
            Self::CancellationWindowExpired(_) => "CANCELLATION_WINDOW_EXPIRED",
            Self::PermanentRemote(_) => "PERMANENT_REMOTE_ERROR",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Remote `{code, message}` pairs carried by the error, if any.
    pub fn remote_errors(&self) -> Option<&[ApiErrorDetail]> {
        match self {
            Self::CancellationWindowExpired(errors) | Self::PermanentRemote(errors)
                if !errors.is_empty() =>
            {
                Some(errors)
            }
            _ => None,
        }
    }

    /// Transient failures may succeed if repeated unchanged.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::RateLimitExceeded | Self::TransientNetwork(_) | Self::Internal(_) => {
                FailureClass::Transient
            }
            _ => FailureClass::Permanent,
        }
    }

    /// JSON stored in an audit entry's `error_details`.
    pub fn to_details(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind(),
            "class": self.class(),
            "message": self.to_string(),
            "errors": self.remote_errors().unwrap_or_default(),
        })
    }
}

impl From<EinvoiceApiError> for GstServiceError {
    fn from(err: EinvoiceApiError) -> Self {
        match err {
            EinvoiceApiError::Authentication(msg) => Self::Authentication(msg),
            EinvoiceApiError::RateLimitExceeded => Self::RateLimitExceeded,
            EinvoiceApiError::Transient(msg) | EinvoiceApiError::InvalidResponse(msg) => {
                Self::TransientNetwork(msg)
            }
            EinvoiceApiError::CancellationWindowExpired(errors) => {
                Self::CancellationWindowExpired(errors)
            }
            EinvoiceApiError::DuplicateIrn { errors, .. } | EinvoiceApiError::Rejected(errors) => {
                Self::PermanentRemote(errors)
            }
        }
    }
}

impl From<sea_orm::DbErr> for GstServiceError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for GstServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) | Self::InvalidState(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::CancellationWindowExpired(_) | Self::PermanentRemote(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::InvoiceNotFound => StatusCode::NOT_FOUND,
            Self::AlreadySubmitted | Self::SubmissionInProgress => StatusCode::CONFLICT,
            Self::Authentication(_) => StatusCode::BAD_GATEWAY,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::TransientNetwork(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let Self::Internal(ref e) = self {
            tracing::error!(error = ?e, kind = "INTERNAL", "internal error");
        }
        let mut body = serde_json::json!({
            "success": false,
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Some(errors) = self.remote_errors() {
            body["errors"] = serde_json::json!(errors);
        }
        (status, axum::Json(body)).into_response()
    }
}
