use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use gst_core::health::healthz;
use gst_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::{
    einvoice::{
        cancel_invoice, get_invoice_logs, get_invoice_status, reconcile, retry_invoice,
        submit_invoice,
    },
    health::readyz,
    settings::{get_settings, test_connection, update_settings},
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Lifecycle
        .route("/gst/einvoice/submit", post(submit_invoice))
        .route("/gst/einvoice/retry", post(retry_invoice))
        .route("/gst/einvoice/cancel", post(cancel_invoice))
        .route("/gst/einvoice/reconcile", post(reconcile))
        .route("/gst/einvoice/{invoice_id}", get(get_invoice_status))
        .route("/gst/einvoice/{invoice_id}/logs", get(get_invoice_logs))
        // Settings
        .route("/gst/settings", get(get_settings).put(update_settings))
        .route("/gst/settings/test-connection", post(test_connection))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .with_state(state)
}
