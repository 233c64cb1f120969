use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_opentelemetry::OpenTelemetryLayer;

use tracing_subscriber::layer::SubscriberExt;

use opentelemetry::KeyValue;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{ExporterBuildError, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use std::error::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitoringConfig {
    pub service_name: String,
    pub app_name: String,
    pub logs: EnvFilterConfig,
    pub traces: EnvFilterConfig,
    pub otlp: Option<OtlpConfig>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EnvFilterConfig {
    pub default_level: String,
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct OtlpConfig {
    pub url: String,
}

impl TryInto<EnvFilter> for EnvFilterConfig {
    type Error = tracing_subscriber::filter::ParseError;

    fn try_into(self) -> Result<EnvFilter, Self::Error> {
        EnvFilter::builder()
            .with_default_directive(self.default_level.parse()?)
            .parse(self.filters.join(","))
    }
}

impl MonitoringConfig {
    pub fn init(&self) -> Result<(), Box<dyn Error>> {
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::default());

        if let Some(otlp_config) = &self.otlp {
            let resource = Resource::builder()
                .with_attribute(KeyValue::new("service.name", self.service_name.clone()))
                .with_attribute(KeyValue::new("app.name", self.app_name.clone()))
                .build();

            let fmt_filter: EnvFilter = self.logs.clone().try_into()?;
            let fmt_layer = tracing_subscriber::fmt::layer().with_filter(fmt_filter);

            let logger_provider = init_logs(resource.clone(), &otlp_config.url)?;
            let logging_filter: EnvFilter = self.logs.clone().try_into()?;
            let logging_layer = OpenTelemetryTracingBridge::new(&logger_provider).with_filter(logging_filter);

            let tracer_provider = init_traces(resource, &otlp_config.url)?;
            let tracer = tracer_provider.tracer(self.app_name.to_owned());
            let tracing_filter: EnvFilter = self.traces.clone().try_into()?;
            let tracing_layer = OpenTelemetryLayer::new(tracer).with_filter(tracing_filter);

            tracing_subscriber::registry()
                .with(tracing_layer)
                .with(logging_layer)
                .with(fmt_layer)
                .init();
        } else {
            let logging_filter: EnvFilter = self.logs.clone().try_into()?;
            let fmt_layer = tracing_subscriber::fmt::layer();
            tracing_subscriber::registry()
                .with(fmt_layer)
                .with(logging_filter)
                .init();
        }

        Ok(())
    }
}

fn init_traces(resource: Resource, url: &str) -> Result<SdkTracerProvider, ExporterBuildError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(url)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

fn init_logs(resource: Resource, url: &str) -> Result<SdkLoggerProvider, ExporterBuildError> {
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(url)
        .build()?;

    Ok(SdkLoggerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}
