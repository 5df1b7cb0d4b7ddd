//! HTTP client for the government e-invoice (IRP) API.
//!
//! Every response is an envelope `{Status, Data, ErrorDetails, InfoDtls}`
//! where `Status = 1` means accepted. `Data` may arrive as an embedded JSON
//! string and numeric fields as either numbers or strings.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::{Value, json};

use crate::domain::einvoice::{
    ApiErrorDetail, ApiOutcome, CancelIrnRequest, ConnectionResult, EinvoiceApiError,
    WebhookEvent,
};
use crate::domain::payload::IrnPayload;
use crate::domain::repository::EinvoicePort;
use crate::domain::settings::GstSettings;
use crate::domain::types::{CancellationDetails, IrnDetails};
use crate::infra::rate_limit::RateLimiter;
use crate::infra::token::{AuthToken, TokenManager};

const AUTH_PATH: &str = "/eivital/v1.04/auth";
const GSTIN_DETAILS_PATH: &str = "/eivital/v1.04/Master/gstin";
const GENERATE_IRN_PATH: &str = "/eicore/v1.03/Invoice";
const CANCEL_IRN_PATH: &str = "/eicore/v1.03/Invoice/Cancel";

/// Auth token invalid or expired.
const ERR_INVALID_TOKEN: &str = "1005";
/// IRN already generated for this document.
const ERR_DUPLICATE_IRN: &str = "2150";
/// IRN older than the cancellation window.
const ERR_CANCEL_WINDOW: &str = "2270";

/// Lifetime assumed when the auth response carries no expiry.
const DEFAULT_TOKEN_TTL_HOURS: i64 = 6;
/// IRP timestamps are Indian Standard Time.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;
const MAX_RAW_BODY_CHARS: usize = 2000;

#[derive(Clone)]
pub struct HttpEinvoiceClient {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    limiter: Arc<RateLimiter>,
    max_wait: Duration,
}

/// Outcome of one HTTP exchange that reached the remote system.
#[derive(Debug)]
enum Reply {
    Accepted(Value),
    Refused {
        errors: Vec<ApiErrorDetail>,
        info: Option<Value>,
    },
}

enum Attempt {
    Unauthorized(Option<Value>),
    Done(Result<Reply, EinvoiceApiError>, Option<Value>),
}

impl HttpEinvoiceClient {
    pub fn new(
        tokens: Arc<TokenManager>,
        limiter: Arc<RateLimiter>,
        max_wait: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gst-einvoice/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            tokens,
            limiter,
            max_wait,
        })
    }

    fn request(
        &self,
        settings: &GstSettings,
        method: Method,
        path: &str,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", settings.api_base_url.trim_end_matches('/'));
        let mut req = self
            .http
            .request(method, url)
            .timeout(settings.request_timeout())
            .header("client_id", settings.client_id.as_str())
            .header("client_secret", settings.client_secret.as_str())
            .header("gstin", settings.company.gstin.as_str());
        for (name, value) in &settings.custom_headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => req = req.header(name, value),
                _ => tracing::warn!(header = %name, "skipping invalid custom header"),
            }
        }
        req
    }

    async fn token(&self, settings: &GstSettings) -> Result<AuthToken, EinvoiceApiError> {
        self.tokens
            .acquire(&settings.credential_fingerprint(), || self.authenticate(settings))
            .await
    }

    async fn authenticate(&self, settings: &GstSettings) -> Result<AuthToken, EinvoiceApiError> {
        self.limiter
            .acquire_slot(settings.rate_limit_requests, self.max_wait)
            .await?;
        let sent = self
            .request(settings, Method::POST, AUTH_PATH)
            .json(&json!({
                "UserName": settings.api_username,
                "Password": settings.api_password,
            }))
            .send()
            .await;
        match interpret(sent).await {
            Attempt::Done(Ok(Reply::Accepted(data)), _) => parse_auth_token(&data, Utc::now()),
            Attempt::Done(Ok(Reply::Refused { errors, .. }), _) => {
                Err(EinvoiceApiError::Authentication(describe(&errors)))
            }
            Attempt::Unauthorized(_) => Err(EinvoiceApiError::Authentication(
                "credentials rejected".to_owned(),
            )),
            Attempt::Done(Err(e), _) => Err(e),
        }
    }

    /// Authenticated call. A rejected token is refreshed and the call
    /// repeated exactly once.
    async fn call<B>(
        &self,
        settings: &GstSettings,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiOutcome<Reply>
    where
        B: Serialize + ?Sized,
    {
        let mut refreshed = false;
        loop {
            let token = match self.token(settings).await {
                Ok(token) => token,
                Err(e) => return ApiOutcome::new(Err(e), None),
            };
            if let Err(e) = self
                .limiter
                .acquire_slot(settings.rate_limit_requests, self.max_wait)
                .await
            {
                return ApiOutcome::new(Err(e), None);
            }

            let mut req = self
                .request(settings, method.clone(), path)
                .header("user_name", settings.api_username.as_str())
                .header("AuthToken", token.value.as_str());
            if let Some(body) = body {
                req = req.json(body);
            }

            match interpret(req.send().await).await {
                Attempt::Unauthorized(_) if !refreshed => {
                    tracing::info!(path, "e-invoice token rejected, refreshing");
                    self.tokens.invalidate_if_current(&token.value).await;
                    refreshed = true;
                }
                Attempt::Unauthorized(raw) => {
                    return ApiOutcome::new(
                        Err(EinvoiceApiError::Authentication(
                            "token rejected after refresh".to_owned(),
                        )),
                        raw,
                    );
                }
                Attempt::Done(result, raw) => return ApiOutcome::new(result, raw),
            }
        }
    }
}

impl EinvoicePort for HttpEinvoiceClient {
    async fn test_connection(&self, settings: &GstSettings) -> ApiOutcome<ConnectionResult> {
        let path = format!("{GSTIN_DETAILS_PATH}/{}", settings.company.gstin);
        let outcome = self
            .call(settings, Method::GET, &path, None::<&Value>)
            .await;
        map_reply(outcome, |reply| match reply {
            Reply::Accepted(_) => Ok(ConnectionResult {
                success: true,
                message: format!("connected to the {} e-invoice system", settings.environment),
            }),
            Reply::Refused { errors, .. } => Err(EinvoiceApiError::Rejected(errors)),
        })
    }

    async fn generate_irn(
        &self,
        settings: &GstSettings,
        payload: &IrnPayload,
    ) -> ApiOutcome<IrnDetails> {
        let outcome = self
            .call(settings, Method::POST, GENERATE_IRN_PATH, Some(payload))
            .await;
        map_reply(outcome, |reply| match reply {
            Reply::Accepted(data) => parse_irn_details(&data).ok_or_else(|| {
                EinvoiceApiError::InvalidResponse("accepted response without Irn/AckNo".to_owned())
            }),
            Reply::Refused { errors, info } => {
                if has_code(&errors, ERR_DUPLICATE_IRN) {
                    Err(EinvoiceApiError::DuplicateIrn {
                        existing: info.as_ref().and_then(duplicate_irn_details),
                        errors,
                    })
                } else {
                    Err(EinvoiceApiError::Rejected(errors))
                }
            }
        })
    }

    async fn cancel_irn(
        &self,
        settings: &GstSettings,
        request: &CancelIrnRequest,
    ) -> ApiOutcome<CancellationDetails> {
        let outcome = self
            .call(settings, Method::POST, CANCEL_IRN_PATH, Some(request))
            .await;
        map_reply(outcome, |reply| match reply {
            Reply::Accepted(data) => {
                let cancel_date = text(&data, "CancelDate").ok_or_else(|| {
                    EinvoiceApiError::InvalidResponse(
                        "accepted cancellation without CancelDate".to_owned(),
                    )
                })?;
                Ok(CancellationDetails {
                    irn: text(&data, "Irn").unwrap_or_else(|| request.irn.clone()),
                    cancel_date,
                })
            }
            Reply::Refused { errors, .. } if has_code(&errors, ERR_CANCEL_WINDOW) => {
                Err(EinvoiceApiError::CancellationWindowExpired(errors))
            }
            Reply::Refused { errors, .. } => Err(EinvoiceApiError::Rejected(errors)),
        })
    }

    async fn notify_webhook(&self, settings: &GstSettings, event: &WebhookEvent) {
        let Some(url) = settings.webhook_url.as_deref() else {
            return;
        };
        let sent = self
            .http
            .post(url)
            .timeout(settings.request_timeout())
            .json(event)
            .send()
            .await;
        match sent {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(
                    event = event.event,
                    invoice_id = %event.invoice_id,
                    "webhook delivered"
                );
            }
            Ok(resp) => tracing::warn!(
                event = event.event,
                invoice_id = %event.invoice_id,
                status = resp.status().as_u16(),
                "webhook rejected"
            ),
            Err(e) => tracing::warn!(
                event = event.event,
                invoice_id = %event.invoice_id,
                error = %e,
                "webhook delivery failed"
            ),
        }
    }
}

// ── Response interpretation ──────────────────────────────────────────────────

async fn interpret(sent: Result<reqwest::Response, reqwest::Error>) -> Attempt {
    let response = match sent {
        Ok(response) => response,
        Err(e) => return Attempt::Done(Err(transport_error(&e)), None),
    };
    let status = response.status();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => return Attempt::Done(Err(transport_error(&e)), None),
    };
    let body: Option<Value> = serde_json::from_str(&text).ok();
    let raw = body.clone().or_else(|| {
        (!text.is_empty()).then(|| Value::String(text.chars().take(MAX_RAW_BODY_CHARS).collect()))
    });

    if status == StatusCode::UNAUTHORIZED {
        return Attempt::Unauthorized(raw);
    }
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Attempt::Done(
            Err(EinvoiceApiError::Transient(format!("HTTP {}", status.as_u16()))),
            raw,
        );
    }
    let Some(body) = body else {
        let err = if status.is_success() {
            EinvoiceApiError::InvalidResponse("response body is not JSON".to_owned())
        } else {
            EinvoiceApiError::Rejected(vec![ApiErrorDetail::new(
                status.as_str(),
                "non-JSON error response",
            )])
        };
        return Attempt::Done(Err(err), raw);
    };

    let accepted = match body.get("Status") {
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => s.trim() == "1",
        _ => false,
    };
    if accepted {
        let result = match embedded_json(body.get("Data")) {
            Some(data) => Ok(Reply::Accepted(data)),
            None => Err(EinvoiceApiError::InvalidResponse(
                "accepted response without Data".to_owned(),
            )),
        };
        return Attempt::Done(result, raw);
    }

    let mut errors = error_details(&body);
    if has_code(&errors, ERR_INVALID_TOKEN) {
        return Attempt::Unauthorized(raw);
    }
    if errors.is_empty() {
        errors.push(ApiErrorDetail::new(
            status.as_str(),
            "request refused without error details",
        ));
    }
    let info = body.get("InfoDtls").filter(|v| !v.is_null()).cloned();
    Attempt::Done(Ok(Reply::Refused { errors, info }), raw)
}

fn transport_error(e: &reqwest::Error) -> EinvoiceApiError {
    if e.is_timeout() {
        EinvoiceApiError::Transient("request timed out".to_owned())
    } else {
        EinvoiceApiError::Transient(e.to_string())
    }
}

fn map_reply<T>(
    outcome: ApiOutcome<Reply>,
    f: impl FnOnce(Reply) -> Result<T, EinvoiceApiError>,
) -> ApiOutcome<T> {
    ApiOutcome::new(outcome.result.and_then(f), outcome.response_payload)
}

/// `Data` may be an object or a JSON document encoded as a string.
fn embedded_json(data: Option<&Value>) -> Option<Value> {
    match data? {
        Value::Null => None,
        Value::String(s) => {
            Some(serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())))
        }
        other => Some(other.clone()),
    }
}

fn error_details(body: &Value) -> Vec<ApiErrorDetail> {
    body.get("ErrorDetails")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|e| {
                    ApiErrorDetail::new(
                        text(e, "ErrorCode").unwrap_or_default(),
                        text(e, "ErrorMessage").unwrap_or_default(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

fn has_code(errors: &[ApiErrorDetail], code: &str) -> bool {
    errors.iter().any(|e| e.code == code)
}

fn describe(errors: &[ApiErrorDetail]) -> String {
    if errors.is_empty() {
        return "credentials rejected".to_owned();
    }
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// String or number field as text.
fn text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_irn_details(data: &Value) -> Option<IrnDetails> {
    Some(IrnDetails {
        irn: text(data, "Irn")?,
        ack_no: text(data, "AckNo")?,
        ack_date: text(data, "AckDt")?,
        qr_code_url: text(data, "QRCodeUrl"),
    })
}

/// Details of the already-issued IRN from `InfoDtls` (`InfCd = DUPIRN`).
fn duplicate_irn_details(info: &Value) -> Option<IrnDetails> {
    let entries = embedded_json(Some(info))?;
    entries.as_array()?.iter().find_map(|entry| {
        let code = text(entry, "InfCd");
        if code.as_deref().is_some_and(|c| c != "DUPIRN") {
            return None;
        }
        parse_irn_details(entry.get("Desc")?)
    })
}

fn parse_auth_token(data: &Value, now: DateTime<Utc>) -> Result<AuthToken, EinvoiceApiError> {
    let value = text(data, "AuthToken").ok_or_else(|| {
        EinvoiceApiError::InvalidResponse("auth response without AuthToken".to_owned())
    })?;
    let expires_at = text(data, "TokenExpiry")
        .and_then(|raw| parse_ist_timestamp(&raw))
        .unwrap_or_else(|| now + chrono::Duration::hours(DEFAULT_TOKEN_TTL_HOURS));
    Ok(AuthToken { value, expires_at })
}

/// `yyyy-MM-dd HH:mm:ss` in IST.
fn parse_ist_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let ist = FixedOffset::east_opt(IST_OFFSET_SECS)?;
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
        .ok()?
        .and_local_timezone(ist)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
