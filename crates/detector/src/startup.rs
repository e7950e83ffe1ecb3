use anyhow::Context;
use common::{TelemetryGuard, setup_logging};

use crate::backend::ort::init_runtime;
use crate::config::DetectorConfig;

const SERVICE_NAME: &str = "detector";

/// Process-lifetime handles created by [`bootstrap`]. Keep it alive until
/// shutdown so buffered telemetry is flushed.
#[must_use = "dropping the runtime shuts telemetry down"]
pub struct Runtime {
    _telemetry: Option<TelemetryGuard>,
}

/// Install logging (and OTLP export when configured), then make sure ONNX
/// Runtime is usable. A missing runtime library fails here, not on the first
/// request.
pub fn bootstrap(config: &DetectorConfig) -> anyhow::Result<Runtime> {
    let telemetry = config
        .otel_endpoint
        .as_ref()
        .map(|endpoint| TelemetryGuard::init(SERVICE_NAME, endpoint, config.environment))
        .transpose()?;

    if telemetry.is_none() && !setup_logging(config.environment) {
        tracing::debug!("Tracing subscriber already installed, keeping it");
    }

    tracing::info!(config = ?config, "Loaded configuration");

    init_runtime().context("ONNX Runtime is not available")?;
    tracing::info!("ONNX Runtime initialized");

    Ok(Runtime {
        _telemetry: telemetry,
    })
}
