use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the JSON stdout subscriber. Call once at service startup.
///
/// Directives come from `RUST_LOG`; `default_directives` applies when it is
/// unset or does not parse. Later calls are no-ops.
pub fn init_tracing(default_directives: &str) {
    let raw = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = env_filter(raw.as_deref(), default_directives);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true).with_current_span(false))
        .try_init();
}

fn env_filter(raw: Option<&str>, default_directives: &str) -> EnvFilter {
    raw.and_then(|raw| EnvFilter::try_new(raw).ok())
        .or_else(|| EnvFilter::try_new(default_directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
