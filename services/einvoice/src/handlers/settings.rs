use std::collections::BTreeMap;

use axum::{Json, extract::State};
use serde_json::Value;

use crate::domain::einvoice::ConnectionResult;
use crate::domain::settings::GstSettingsUpdate;
use crate::error::GstServiceError;
use crate::handlers::einvoice::OperationResponse;
use crate::state::AppState;
use crate::usecase::settings::{GetSettingsUseCase, TestConnectionUseCase, UpdateSettingsUseCase};

// ── GET /gst/settings ────────────────────────────────────────────────────────

pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<&'static str, Value>>, GstServiceError> {
    let usecase = GetSettingsUseCase {
        repo: state.settings_repo(),
    };
    Ok(Json(usecase.execute().await?))
}

// ── PUT /gst/settings ────────────────────────────────────────────────────────

pub async fn update_settings(
    State(state): State<AppState>,
    Json(body): Json<GstSettingsUpdate>,
) -> Result<Json<OperationResponse<BTreeMap<&'static str, Value>>>, GstServiceError> {
    let usecase = UpdateSettingsUseCase {
        repo: state.settings_repo(),
        cache: state.settings_cache(),
    };
    let view = usecase.execute(body).await?;
    Ok(Json(OperationResponse {
        success: true,
        message: "GST settings saved".to_owned(),
        data: view,
    }))
}

// ── POST /gst/settings/test-connection ───────────────────────────────────────

pub async fn test_connection(
    State(state): State<AppState>,
) -> Result<Json<ConnectionResult>, GstServiceError> {
    let usecase = TestConnectionUseCase {
        settings: state.settings_store(),
        logs: state.log_repo(),
        api: state.einvoice.clone(),
    };
    Ok(Json(usecase.execute().await?))
}
