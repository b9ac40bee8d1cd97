//! Tracing subscriber configuration.

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use swarm_core::{config::LoggingConfig, Error, Result};

/// `RUST_LOG` wins over the configured filter.
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

/// Install the global subscriber: filter, plain or JSON stdout output, and an
/// OTLP exporter when `otlp_endpoint` is set.
pub fn configure_tracing(config: &LoggingConfig) -> Result<()> {
    let json_layer = config.json.then(|| tracing_subscriber::fmt::layer().json());
    let plain_layer = (!config.json).then(tracing_subscriber::fmt::layer);

    let registry = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(json_layer)
        .with(plain_layer);

    let installed = if let Some(endpoint) = &config.otlp_endpoint {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(endpoint.clone()),
            )
            .with_trace_config(
                sdktrace::Config::default().with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    "swarm-mission",
                )])),
            )
            .install_batch(runtime::Tokio)
            .map_err(|e| Error::internal(format!("Failed to install OTLP pipeline: {}", e)))?;

        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        registry.with(otel_layer).try_init()
    } else {
        registry.try_init()
    };
    installed.map_err(|e| Error::internal(format!("Failed to install tracing subscriber: {}", e)))?;

    if let Some(endpoint) = &config.otlp_endpoint {
        tracing::info!(endpoint = %endpoint, "OpenTelemetry tracing enabled");
    }
    Ok(())
}
