//! Telemetry and tracing configuration.

mod tracing;

use anyhow::Context;

use crate::config::TelemetryConfig;

/// Initializes the tracing subscriber from the telemetry configuration.
///
/// # Errors
///
/// Returns an error if the tracing subscriber fails to initialize.
pub(crate) fn init_tracing(config: &TelemetryConfig) -> anyhow::Result<()> {
    tracing::init_tracing(config.log_format).context("Failed to initialize tracing")
}
