//! Tracing/logging initialization.

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber: JSON fmt output filtered by
/// `RUST_LOG`/`log_level`, plus an OTLP export pipeline when an endpoint
/// is configured.
pub fn init_tracing(service_name: &str, log_level: &str, otlp_endpoint: Option<&str>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .json()
        .flatten_event(true);

    let registry = tracing_subscriber::registry().with(env_filter).with(fmt_layer);

    match otlp_endpoint {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint);

            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(exporter)
                .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                    KeyValue::new("service.name", service_name.to_string()),
                ])))
                .install_batch(runtime::Tokio);

            match tracer {
                Ok(tracer) => {
                    registry
                        .with(tracing_opentelemetry::layer().with_tracer(tracer))
                        .init();
                }
                Err(e) => {
                    // Local logging still works without the exporter.
                    registry.init();
                    tracing::error!(endpoint = %endpoint, error = %e, "Failed to initialize OTLP tracer");
                }
            }
        }
        None => registry.init(),
    }
}
