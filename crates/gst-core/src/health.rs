use std::collections::BTreeMap;
use std::fmt::Display;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Handler for `GET /healthz`: the process is up and serving.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Result of the dependency checks behind `GET /readyz`.
///
/// Responds 200 when every check passed and 503 otherwise; the body names
/// each dependency with `"ok"` or its error.
#[derive(Debug, Serialize)]
pub struct Readiness {
    ready: bool,
    checks: BTreeMap<&'static str, String>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    pub fn new() -> Self {
        Self {
            ready: true,
            checks: BTreeMap::new(),
        }
    }

    pub fn check<E: Display>(mut self, name: &'static str, result: Result<(), E>) -> Self {
        let outcome = match result {
            Ok(()) => "ok".to_owned(),
            Err(e) => {
                tracing::warn!(dependency = name, error = %e, "readiness check failed");
                self.ready = false;
                e.to_string()
            }
        };
        self.checks.insert(name, outcome);
        self
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

impl IntoResponse for Readiness {
    fn into_response(self) -> Response {
        let status = if self.ready {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, Json(self)).into_response()
    }
}
