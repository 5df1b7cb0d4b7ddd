use std::sync::Arc;
use std::time::Duration;

use sea_orm::Database;
use tracing::info;

use gst_core::config::Config;
use gst_core::tracing::init_tracing;
use gst_einvoice::config::EinvoiceConfig;
use gst_einvoice::domain::retry::RetryPolicy;
use gst_einvoice::infra::einvoice_api::HttpEinvoiceClient;
use gst_einvoice::infra::rate_limit::RateLimiter;
use gst_einvoice::infra::token::TokenManager;
use gst_einvoice::router::build_router;
use gst_einvoice::state::AppState;

const DEFAULT_LOG_DIRECTIVES: &str = "info,sqlx=warn";

#[tokio::main]
async fn main() {
    init_tracing(DEFAULT_LOG_DIRECTIVES);

    let config = EinvoiceConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let redis_cfg = deadpool_redis::Config::from_url(&config.redis_url);
    let redis = redis_cfg
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .expect("failed to create Redis pool");

    let rate_limit_max_wait = Duration::from_secs(config.rate_limit_max_wait_secs);
    let einvoice = HttpEinvoiceClient::new(
        Arc::new(TokenManager::new()),
        Arc::new(RateLimiter::new()),
        rate_limit_max_wait,
    )
    .expect("failed to build e-invoice HTTP client");

    let state = AppState {
        db,
        redis,
        einvoice,
        settings_cache_ttl_secs: config.settings_cache_ttl_secs,
        rate_limit_max_wait,
        retry_policy: RetryPolicy::new(
            Duration::from_secs(config.retry_base_delay_secs),
            Duration::from_secs(config.retry_max_delay_secs),
        ),
        reconcile_batch_size: config.reconcile_batch_size,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.einvoice_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("einvoice service listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}
