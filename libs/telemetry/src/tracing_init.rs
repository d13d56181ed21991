use std::sync::OnceLock;

use anyhow::Result;
use tracing::Span;
use tracing_subscriber::layer::Layer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::TelemetryConfig;

static INIT: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber once; later calls are no-ops.
pub fn init_telemetry(cfg: TelemetryConfig) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let fmt_layer = if cfg.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Another subscriber (e.g. a test harness) may already be installed.
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .ok();

    tracing::debug!(
        service = %cfg.service_name,
        version = %cfg.service_version,
        json = cfg.json_logs,
        "telemetry initialised"
    );
    INIT.set(()).ok();
    Ok(())
}

/// Records the identifiers shared by send and sync spans.
pub fn with_common_fields(
    span: &Span,
    provider: &str,
    template: Option<&str>,
    message_id: Option<&str>,
) {
    span.record("provider", tracing::field::display(provider));
    if let Some(template) = template {
        span.record("template", tracing::field::display(template));
    }
    if let Some(message_id) = message_id {
        span.record("message_id", tracing::field::display(message_id));
    }
}
