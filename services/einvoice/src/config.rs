use serde::Deserialize;

use gst_core::config::Config;

/// E-invoice service configuration loaded from environment variables.
///
/// Tenant GST credentials are not here; they live in the `gst_settings` table.
#[derive(Debug, Deserialize)]
pub struct EinvoiceConfig {
    /// PostgreSQL connection URL. Env var: `DATABASE_URL`.
    pub database_url: String,
    /// Redis connection URL for the settings cache. Env var: `REDIS_URL`.
    pub redis_url: String,
    /// TCP port to listen on (default 3120). Env var: `EINVOICE_PORT`.
    #[serde(default = "default_port")]
    pub einvoice_port: u16,
    /// TTL of the cached settings snapshot in Redis.
    #[serde(default = "default_settings_cache_ttl_secs")]
    pub settings_cache_ttl_secs: u64,
    /// Longest a caller may queue for an outbound rate-limit slot.
    #[serde(default = "default_rate_limit_max_wait_secs")]
    pub rate_limit_max_wait_secs: u64,
    /// Base delay of the automatic retry backoff.
    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,
    /// Cap of the automatic retry backoff.
    #[serde(default = "default_retry_max_delay_secs")]
    pub retry_max_delay_secs: u64,
    /// Invoices examined per reconciliation pass and status.
    #[serde(default = "default_reconcile_batch_size")]
    pub reconcile_batch_size: u64,
}

impl Config for EinvoiceConfig {}

fn default_port() -> u16 {
    3120
}

fn default_settings_cache_ttl_secs() -> u64 {
    30
}

fn default_rate_limit_max_wait_secs() -> u64 {
    30
}

fn default_retry_base_delay_secs() -> u64 {
    30
}

fn default_retry_max_delay_secs() -> u64 {
    1800
}

fn default_reconcile_batch_size() -> u64 {
    50
}
