use crate::config::Environment;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::Layered, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Initialize the global tracing subscriber: pretty output for development,
/// JSON for production.
///
/// Filtering follows `RUST_LOG` (defaults to "info"). An OpenTelemetry layer
/// is attached as well; it forwards spans once a global tracer provider is
/// installed (see [`crate::TelemetryGuard`]).
///
/// Returns `false` when a subscriber was already installed, which happens
/// when a host process or a test harness set one up first.
pub fn setup_logging(environment: Environment) -> bool {
    install(environment, tracing_opentelemetry::layer())
}

pub(crate) fn install<L>(environment: Environment, otel_layer: L) -> bool
where
    L: Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static,
{
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    let installed = match environment {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_level(true))
            .try_init(),
        Environment::Development => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
            .try_init(),
    };

    installed.is_ok()
}
