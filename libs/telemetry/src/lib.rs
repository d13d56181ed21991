//! Subscriber setup shared by the WhatsApp messaging binaries.
//!
//! Output format comes from `LOG_FORMAT` (`json` or pretty text) and the filter
//! from `RUST_LOG`, falling back to `WAMSG_LOG_LEVEL` and then `info`.

use anyhow::Result;

mod config;
mod tracing_init;

pub use config::TelemetryConfig;
pub use tracing_init::{init_telemetry, with_common_fields};

/// Installs the subscriber configured from the environment.
pub fn install(service_name: &str) -> Result<()> {
    init_telemetry(TelemetryConfig::from_env(
        service_name,
        env!("CARGO_PKG_VERSION"),
    ))
}
