use axum::extract::State;

use gst_core::health::Readiness;

use crate::state::AppState;

// ── GET /readyz ──────────────────────────────────────────────────────────────

/// Ready once both the database and the settings cache answer.
pub async fn readyz(State(state): State<AppState>) -> Readiness {
    let database = state.db.ping().await;
    let redis = state.settings_cache().ping().await;
    Readiness::new()
        .check("database", database)
        .check("redis", redis.map_err(|e| format!("{e:#}")))
}
