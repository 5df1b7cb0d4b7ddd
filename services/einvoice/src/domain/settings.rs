//! GST API configuration stored as key/value rows.
//!
//! [`GstSettings`] is the validated, typed view used by every external call.
//! It is rebuilt from the raw pairs so a credential rotation written through
//! the settings endpoint takes effect on the next call.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gst_domain::environment::GstEnvironment;
use gst_domain::gstin::Gstin;

use crate::error::GstServiceError;

/// Placeholder returned in place of secrets; writing it back is a no-op.
pub const MASKED_SECRET: &str = "********";

pub mod keys {
    pub const API_BASE_URL: &str = "api_base_url";
    pub const CLIENT_ID: &str = "client_id";
    pub const CLIENT_SECRET: &str = "client_secret";
    pub const API_USERNAME: &str = "api_username";
    pub const API_PASSWORD: &str = "api_password";
    pub const ENVIRONMENT: &str = "environment";
    pub const RETRY_ATTEMPTS: &str = "retry_attempts";
    pub const REQUEST_TIMEOUT: &str = "request_timeout";
    pub const RATE_LIMIT_REQUESTS: &str = "rate_limit_requests";
    pub const AUTO_SUBMIT_INVOICES: &str = "auto_submit_invoices";
    pub const WEBHOOK_URL: &str = "webhook_url";
    pub const CUSTOM_HEADERS: &str = "custom_headers";
    pub const COMPANY_GSTIN: &str = "company_gstin";
    pub const COMPANY_LEGAL_NAME: &str = "company_legal_name";
    pub const COMPANY_TRADE_NAME: &str = "company_trade_name";
    pub const COMPANY_ADDRESS1: &str = "company_address1";
    pub const COMPANY_ADDRESS2: &str = "company_address2";
    pub const COMPANY_LOCATION: &str = "company_location";
    pub const COMPANY_STATE: &str = "company_state";
    pub const COMPANY_STATE_CODE: &str = "company_state_code";
    pub const COMPANY_PINCODE: &str = "company_pincode";

    pub const SECRETS: [&str; 2] = [CLIENT_SECRET, API_PASSWORD];

    pub const ALL: [&str; 21] = [
        API_BASE_URL,
        CLIENT_ID,
        CLIENT_SECRET,
        API_USERNAME,
        API_PASSWORD,
        ENVIRONMENT,
        RETRY_ATTEMPTS,
        REQUEST_TIMEOUT,
        RATE_LIMIT_REQUESTS,
        AUTO_SUBMIT_INVOICES,
        WEBHOOK_URL,
        CUSTOM_HEADERS,
        COMPANY_GSTIN,
        COMPANY_LEGAL_NAME,
        COMPANY_TRADE_NAME,
        COMPANY_ADDRESS1,
        COMPANY_ADDRESS2,
        COMPANY_LOCATION,
        COMPANY_STATE,
        COMPANY_STATE_CODE,
        COMPANY_PINCODE,
    ];
}

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 60;

// ── Typed settings ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GstSettings {
    pub api_base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub api_username: String,
    pub api_password: String,
    pub environment: GstEnvironment,
    pub retry_attempts: u32,
    pub request_timeout_secs: u64,
    /// Outbound calls per rolling minute; `0` disables throttling.
    pub rate_limit_requests: u32,
    pub auto_submit_invoices: bool,
    pub webhook_url: Option<String>,
    pub custom_headers: BTreeMap<String, String>,
    pub company: CompanyProfile,
}

/// Seller details emitted in every IRN payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub gstin: Gstin,
    pub legal_name: Option<String>,
    pub trade_name: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub location: Option<String>,
    pub state: Option<String>,
    pub state_code: String,
    pub pincode: Option<u32>,
}

impl GstSettings {
    /// Builds and validates settings from stored pairs.
    ///
    /// Fails with [`GstServiceError::Config`] naming the first offending key.
    pub fn from_pairs(pairs: &HashMap<String, String>) -> Result<Self, GstServiceError> {
        let api_base_url = required(pairs, keys::API_BASE_URL)?;
        validate_url(keys::API_BASE_URL, &api_base_url)?;
        let webhook_url = optional(pairs, keys::WEBHOOK_URL);
        if let Some(url) = &webhook_url {
            validate_url(keys::WEBHOOK_URL, url)?;
        }

        let environment = match optional(pairs, keys::ENVIRONMENT) {
            Some(raw) => raw
                .parse::<GstEnvironment>()
                .map_err(|e| GstServiceError::Config(format!("{}: {e}", keys::ENVIRONMENT)))?,
            None => GstEnvironment::default(),
        };

        let request_timeout_secs =
            number(pairs, keys::REQUEST_TIMEOUT)?.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(GstServiceError::Config(format!(
                "{} must be at least 1 second",
                keys::REQUEST_TIMEOUT
            )));
        }

        let custom_headers = match optional(pairs, keys::CUSTOM_HEADERS) {
            Some(raw) => serde_json::from_str(&raw).map_err(|_| {
                GstServiceError::Config(format!(
                    "{} must be a JSON object of string values",
                    keys::CUSTOM_HEADERS
                ))
            })?,
            None => BTreeMap::new(),
        };

        let gstin_raw = required(pairs, keys::COMPANY_GSTIN)?;
        let gstin =
            Gstin::parse(&gstin_raw).map_err(|e| GstServiceError::Config(e.to_string()))?;
        let state_code = optional(pairs, keys::COMPANY_STATE_CODE)
            .unwrap_or_else(|| gstin.state_code().to_owned());

        Ok(Self {
            api_base_url,
            client_id: required(pairs, keys::CLIENT_ID)?,
            client_secret: optional(pairs, keys::CLIENT_SECRET).unwrap_or_default(),
            api_username: required(pairs, keys::API_USERNAME)?,
            api_password: optional(pairs, keys::API_PASSWORD).unwrap_or_default(),
            environment,
            retry_attempts: number(pairs, keys::RETRY_ATTEMPTS)?
                .unwrap_or(DEFAULT_RETRY_ATTEMPTS),
            request_timeout_secs,
            rate_limit_requests: number(pairs, keys::RATE_LIMIT_REQUESTS)?
                .unwrap_or(DEFAULT_RATE_LIMIT_REQUESTS),
            auto_submit_invoices: flag(pairs, keys::AUTO_SUBMIT_INVOICES)?,
            webhook_url,
            custom_headers,
            company: CompanyProfile {
                gstin,
                legal_name: optional(pairs, keys::COMPANY_LEGAL_NAME),
                trade_name: optional(pairs, keys::COMPANY_TRADE_NAME),
                address1: optional(pairs, keys::COMPANY_ADDRESS1),
                address2: optional(pairs, keys::COMPANY_ADDRESS2),
                location: optional(pairs, keys::COMPANY_LOCATION),
                state: optional(pairs, keys::COMPANY_STATE),
                state_code,
                pincode: number(pairs, keys::COMPANY_PINCODE)?,
            },
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Identifies the credential set; a change forces a new auth token.
    pub fn credential_fingerprint(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.api_base_url.trim_end_matches('/'),
            self.client_id,
            self.api_username,
            self.company.gstin
        )
    }
}

fn optional(pairs: &HashMap<String, String>, key: &str) -> Option<String> {
    pairs
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn required(pairs: &HashMap<String, String>, key: &str) -> Result<String, GstServiceError> {
    optional(pairs, key).ok_or_else(|| GstServiceError::Config(format!("{key} is not configured")))
}

fn number<T: std::str::FromStr>(
    pairs: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, GstServiceError> {
    optional(pairs, key)
        .map(|raw| {
            raw.parse().map_err(|_| {
                GstServiceError::Config(format!("{key} must be a non-negative integer"))
            })
        })
        .transpose()
}

fn flag(pairs: &HashMap<String, String>, key: &str) -> Result<bool, GstServiceError> {
    match optional(pairs, key).map(|v| v.to_ascii_lowercase()).as_deref() {
        None | Some("false" | "0" | "no" | "off") => Ok(false),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some(_) => Err(GstServiceError::Config(format!("{key} must be a boolean"))),
    }
}

fn validate_url(key: &str, raw: &str) -> Result<(), GstServiceError> {
    match url::Url::parse(raw) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => Ok(()),
        _ => Err(GstServiceError::Config(format!(
            "{key} must be an absolute http(s) URL"
        ))),
    }
}

// ── Partial update ───────────────────────────────────────────────────────────

/// Settings write request. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GstSettingsUpdate {
    pub api_base_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_username: Option<String>,
    pub api_password: Option<String>,
    pub environment: Option<GstEnvironment>,
    pub retry_attempts: Option<u32>,
    pub request_timeout: Option<u64>,
    pub rate_limit_requests: Option<u32>,
    pub auto_submit_invoices: Option<bool>,
    pub webhook_url: Option<String>,
    pub custom_headers: Option<BTreeMap<String, String>>,
    pub company_gstin: Option<String>,
    pub company_legal_name: Option<String>,
    pub company_trade_name: Option<String>,
    pub company_address1: Option<String>,
    pub company_address2: Option<String>,
    pub company_location: Option<String>,
    pub company_state: Option<String>,
    pub company_state_code: Option<String>,
    pub company_pincode: Option<u32>,
}

impl GstSettingsUpdate {
    /// Stored representation of every field present in the update.
    ///
    /// A secret equal to [`MASKED_SECRET`] is skipped so a read-modify-write
    /// of the masked view leaves the stored secret intact.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let mut text = |key: &'static str, value: &Option<String>| {
            if let Some(v) = value {
                if keys::SECRETS.contains(&key) && v == MASKED_SECRET {
                    return;
                }
                pairs.push((key, v.trim().to_owned()));
            }
        };
        text(keys::API_BASE_URL, &self.api_base_url);
        text(keys::CLIENT_ID, &self.client_id);
        text(keys::CLIENT_SECRET, &self.client_secret);
        text(keys::API_USERNAME, &self.api_username);
        text(keys::API_PASSWORD, &self.api_password);
        text(keys::WEBHOOK_URL, &self.webhook_url);
        text(
            keys::COMPANY_GSTIN,
            &self.company_gstin.as_ref().map(|g| g.to_ascii_uppercase()),
        );
        text(keys::COMPANY_LEGAL_NAME, &self.company_legal_name);
        text(keys::COMPANY_TRADE_NAME, &self.company_trade_name);
        text(keys::COMPANY_ADDRESS1, &self.company_address1);
        text(keys::COMPANY_ADDRESS2, &self.company_address2);
        text(keys::COMPANY_LOCATION, &self.company_location);
        text(keys::COMPANY_STATE, &self.company_state);
        text(keys::COMPANY_STATE_CODE, &self.company_state_code);

        if let Some(env) = self.environment {
            pairs.push((keys::ENVIRONMENT, env.as_str().to_owned()));
        }
        if let Some(n) = self.retry_attempts {
            pairs.push((keys::RETRY_ATTEMPTS, n.to_string()));
        }
        if let Some(n) = self.request_timeout {
            pairs.push((keys::REQUEST_TIMEOUT, n.to_string()));
        }
        if let Some(n) = self.rate_limit_requests {
            pairs.push((keys::RATE_LIMIT_REQUESTS, n.to_string()));
        }
        if let Some(b) = self.auto_submit_invoices {
            pairs.push((keys::AUTO_SUBMIT_INVOICES, b.to_string()));
        }
        if let Some(headers) = &self.custom_headers {
            // BTreeMap<String, String> always serializes.
            let raw = serde_json::to_string(headers).unwrap_or_else(|_| "{}".to_owned());
            pairs.push((keys::CUSTOM_HEADERS, raw));
        }
        if let Some(n) = self.company_pincode {
            pairs.push((keys::COMPANY_PINCODE, n.to_string()));
        }
        pairs
    }
}

// ── Masked view ──────────────────────────────────────────────────────────────

/// Stored settings as returned to clients: known keys only, secrets masked,
/// numbers and flags typed.
pub fn masked_view(pairs: &HashMap<String, String>) -> BTreeMap<&'static str, serde_json::Value> {
    use serde_json::Value;

    keys::ALL
        .iter()
        .filter_map(|&key| {
            let raw = pairs.get(key)?;
            let value = if keys::SECRETS.contains(&key) {
                Value::from(if raw.is_empty() { "" } else { MASKED_SECRET })
            } else {
                match key {
                    keys::RETRY_ATTEMPTS
                    | keys::REQUEST_TIMEOUT
                    | keys::RATE_LIMIT_REQUESTS
                    | keys::COMPANY_PINCODE => raw
                        .parse::<u64>()
                        .map(Value::from)
                        .unwrap_or_else(|_| Value::from(raw.as_str())),
                    keys::AUTO_SUBMIT_INVOICES => Value::from(raw == "true"),
                    keys::CUSTOM_HEADERS => serde_json::from_str(raw)
                        .unwrap_or_else(|_| Value::from(raw.as_str())),
                    _ => Value::from(raw.as_str()),
                }
            };
            Some((key, value))
        })
        .collect()
}
