use std::env;

#[cfg(feature = "otlp")]
use opentelemetry_otlp as otlp;
use tracing::{dispatcher, Subscriber};
use tracing_subscriber::{
    layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, Layer, Registry,
};

const KEY_LEVEL: &str = "RUST_LOG";
const KEY_FORMAT: &str = "LOG_FORMAT";
const KEY_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const KEY_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";

fn init_once_opentelemetry(export: bool) {
    #[cfg(feature = "otlp")]
    use opentelemetry_sdk::runtime::Tokio as Runtime;

    #[cfg(feature = "otlp")]
    fn init_otlp_pipeline() -> otlp::TonicExporterBuilder {
        otlp::new_exporter().tonic()
    }

    fn init_layer_env_filter<S>() -> impl Layer<S>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        ::tracing_subscriber::EnvFilter::from_default_env()
    }

    fn init_layer_stdfmt<S>() -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        match env::var(KEY_FORMAT).as_deref() {
            Ok("json") => ::tracing_subscriber::fmt::layer().json().boxed(),
            _ => ::tracing_subscriber::fmt::layer().boxed(),
        }
    }

    #[cfg(feature = "metrics")]
    fn init_layer_otlp_metrics<S>() -> impl Layer<S>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        otlp::new_pipeline()
            .metrics(Runtime)
            .with_exporter(init_otlp_pipeline())
            .build()
            .map(::tracing_opentelemetry::MetricsLayer::new)
            .expect("failed to init a metrics")
    }

    #[cfg(feature = "trace")]
    fn init_layer_otlp_tracer<S>() -> impl Layer<S>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        otlp::new_pipeline()
            .tracing()
            .with_exporter(init_otlp_pipeline())
            .install_batch(Runtime)
            .map(::tracing_opentelemetry::OpenTelemetryLayer::new)
            .expect("failed to init a tracer")
    }

    let layer = Registry::default()
        .with(init_layer_env_filter())
        .with(init_layer_stdfmt());

    if export {
        #[cfg(feature = "metrics")]
        let layer = layer.with(init_layer_otlp_metrics());
        #[cfg(feature = "trace")]
        let layer = layer.with(init_layer_otlp_tracer());

        layer.init()
    } else {
        layer.init()
    }
}

/// Installs the global subscriber once, naming the exported telemetry after `service_name`.
pub fn init_once_as(service_name: &str) {
    // Skip init if has been set
    if dispatcher::has_been_set() {
        return;
    }

    if env::var_os(KEY_SERVICE_NAME).is_none() {
        env::set_var(KEY_SERVICE_NAME, service_name);
    }
    if env::var_os(KEY_LEVEL).is_none() {
        env::set_var(KEY_LEVEL, "INFO");
    }

    // Export only when a collector is configured
    let export = env::var_os(KEY_OTLP_ENDPOINT).is_some();
    init_once_opentelemetry(export)
}
