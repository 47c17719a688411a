use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use opentelemetry_sdk::{
    logs::SdkLoggerProvider, metrics::SdkMeterProvider, trace::SdkTracerProvider,
};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{
    EnvFilter, Layer as _, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use crate::cli::{CliArgs, CliArgsOtelExporter};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub struct Provider {
    logger: SdkLoggerProvider,
    meter: SdkMeterProvider,
    service_name: String,
    tracer: SdkTracerProvider,
}

impl Provider {
    /// # Errors
    ///
    /// Will return `Err` if an OTLP exporter is requested without an endpoint
    /// or protocol, or if an exporter could not be built.
    pub fn new(cli: &CliArgs) -> Result<Self, BoxError> {
        Ok(Self {
            logger: logger_provider(cli)?,
            meter: meter_provider(cli)?,
            service_name: cli.otel_service_name.clone(),
            tracer: tracer_provider(cli)?,
        })
    }

    #[must_use]
    pub fn meter(&self) -> &SdkMeterProvider {
        &self.meter
    }

    /// # Errors
    ///
    /// Will return `Err` if a global subscriber is already installed.
    pub fn init_tracing_subscriber(&self) -> Result<(), BoxError> {
        let logger_layer =
            OpenTelemetryTracingBridge::new(&self.logger).with_filter(external_component_filter()?);

        let tracer_layer = OpenTelemetryLayer::new(self.tracer.tracer(self.service_name.clone()))
            .with_filter(external_component_filter()?);

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_thread_names(true)
            .with_filter(EnvFilter::from_default_env());

        tracing_subscriber::registry()
            .with(logger_layer)
            .with(tracer_layer)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }

    /// # Errors
    ///
    /// Will return `Err` if open telemetry providers could not shutdown.
    pub fn shutdown(&self) -> Result<(), BoxError> {
        let shutdown_errors: Vec<String> = [
            ("tracer", self.tracer.shutdown()),
            ("meter", self.meter.shutdown()),
            ("logger", self.logger.shutdown()),
        ]
        .into_iter()
        .filter_map(|(provider, result)| result.err().map(|e| format!("{provider} provider: {e}")))
        .collect();

        if shutdown_errors.is_empty() {
            Ok(())
        } else {
            Err(format!("failed to shutdown providers: {}", shutdown_errors.join(", ")).into())
        }
    }
}

/// OpenTelemetry suppresses its own logging, but the transports underneath
/// the OTLP exporters do not propagate its context. Logs from them are
/// dropped before they reach an exporter to avoid a feedback loop.
///
/// See <https://github.com/open-telemetry/opentelemetry-rust/issues/2877>.
fn external_component_filter() -> Result<EnvFilter, BoxError> {
    Ok(EnvFilter::from_default_env()
        .add_directive("hyper=off".parse()?)
        .add_directive("tonic=off".parse()?)
        .add_directive("h2=off".parse()?)
        .add_directive("reqwest=off".parse()?))
}

fn resource(cli: &CliArgs) -> opentelemetry_sdk::Resource {
    opentelemetry_sdk::Resource::builder()
        .with_service_name(cli.otel_service_name.clone())
        .build()
}

/*
 * ============================================================================
 * Signal
 * ============================================================================
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Logs,
    Metrics,
    Traces,
}

impl Signal {
    fn path(self) -> &'static str {
        match self {
            Signal::Logs => "v1/logs",
            Signal::Metrics => "v1/metrics",
            Signal::Traces => "v1/traces",
        }
    }

    fn exporters(self, cli: &CliArgs) -> &[CliArgsOtelExporter] {
        match self {
            Signal::Logs => cli.otel_logs_exporter.as_deref(),
            Signal::Metrics => cli.otel_metrics_exporter.as_deref(),
            Signal::Traces => cli.otel_traces_exporter.as_deref(),
        }
        .unwrap_or_default()
    }

    /// A signal specific endpoint is used as is. The shared endpoint is a
    /// base URL for the HTTP transports.
    fn endpoint(self, cli: &CliArgs, protocol: Protocol) -> Result<String, BoxError> {
        let endpoint = match self {
            Signal::Logs => &cli.otel_exporter_otlp_logs_endpoint,
            Signal::Metrics => &cli.otel_exporter_otlp_metrics_endpoint,
            Signal::Traces => &cli.otel_exporter_otlp_traces_endpoint,
        };

        if let Some(endpoint) = endpoint {
            return Ok(endpoint.clone());
        }

        match (&cli.otel_exporter_otlp_endpoint, protocol) {
            (Some(endpoint), Protocol::Grpc) => Ok(endpoint.clone()),
            (Some(endpoint), Protocol::HttpBinary | Protocol::HttpJson) => {
                Ok(format!("{}/{}", endpoint.trim_end_matches('/'), self.path()))
            }
            (None, _) => Err(format!("no OTLP endpoint configured for {self:?}").into()),
        }
    }

    fn protocol(self, cli: &CliArgs) -> Result<Protocol, BoxError> {
        match self {
            Signal::Logs => cli.otel_exporter_otlp_logs_protocol,
            Signal::Metrics => cli.otel_exporter_otlp_metrics_protocol,
            Signal::Traces => cli.otel_exporter_otlp_traces_protocol,
        }
        .or(cli.otel_exporter_otlp_protocol)
        .map(Into::into)
        .ok_or_else(|| format!("no OTLP protocol configured for {self:?}").into())
    }

    fn timeout(self, cli: &CliArgs) -> Duration {
        let timeout = match self {
            Signal::Logs => cli.otel_exporter_otlp_logs_timeout,
            Signal::Metrics => cli.otel_exporter_otlp_metrics_timeout,
            Signal::Traces => cli.otel_exporter_otlp_traces_timeout,
        };

        Duration::from_millis(timeout.unwrap_or(cli.otel_exporter_otlp_timeout))
    }

    fn otlp(self, cli: &CliArgs) -> Result<Option<(String, Protocol, Duration)>, BoxError> {
        if !self.exporters(cli).contains(&CliArgsOtelExporter::Otlp) {
            return Ok(None);
        }

        let protocol = self.protocol(cli)?;
        let endpoint = self.endpoint(cli, protocol)?;
        Ok(Some((endpoint, protocol, self.timeout(cli))))
    }

    fn console(self, cli: &CliArgs) -> bool {
        self.exporters(cli).contains(&CliArgsOtelExporter::Console)
    }
}

/*
 * ============================================================================
 * Providers
 * ============================================================================
 */
fn logger_provider(cli: &CliArgs) -> Result<SdkLoggerProvider, BoxError> {
    let mut provider_builder = SdkLoggerProvider::builder().with_resource(resource(cli));

    if Signal::Logs.console(cli) {
        provider_builder =
            provider_builder.with_simple_exporter(opentelemetry_stdout::LogExporter::default());
    }

    if let Some((endpoint, protocol, timeout)) = Signal::Logs.otlp(cli)? {
        let exporter = match protocol {
            Protocol::Grpc => opentelemetry_otlp::LogExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .with_protocol(protocol)
                .with_timeout(timeout)
                .build()?,
            Protocol::HttpBinary | Protocol::HttpJson => opentelemetry_otlp::LogExporter::builder()
                .with_http()
                .with_endpoint(endpoint)
                .with_protocol(protocol)
                .with_timeout(timeout)
                .build()?,
        };
        provider_builder = provider_builder.with_batch_exporter(exporter);
    }

    Ok(provider_builder.build())
}

fn meter_provider(cli: &CliArgs) -> Result<SdkMeterProvider, BoxError> {
    let mut provider_builder = SdkMeterProvider::builder().with_resource(resource(cli));

    if Signal::Metrics.console(cli) {
        provider_builder = provider_builder.with_periodic_exporter(
            opentelemetry_stdout::MetricExporterBuilder::default().build(),
        );
    }

    if let Some((endpoint, protocol, timeout)) = Signal::Metrics.otlp(cli)? {
        let exporter = match protocol {
            Protocol::Grpc => opentelemetry_otlp::MetricExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .with_protocol(protocol)
                .with_timeout(timeout)
                .build()?,
            Protocol::HttpBinary | Protocol::HttpJson => {
                opentelemetry_otlp::MetricExporter::builder()
                    .with_http()
                    .with_endpoint(endpoint)
                    .with_protocol(protocol)
                    .with_timeout(timeout)
                    .build()?
            }
        };
        provider_builder = provider_builder.with_periodic_exporter(exporter);
    }

    Ok(provider_builder.build())
}

fn tracer_provider(cli: &CliArgs) -> Result<SdkTracerProvider, BoxError> {
    let mut provider_builder = SdkTracerProvider::builder().with_resource(resource(cli));

    if Signal::Traces.console(cli) {
        provider_builder =
            provider_builder.with_simple_exporter(opentelemetry_stdout::SpanExporter::default());
    }

    if let Some((endpoint, protocol, timeout)) = Signal::Traces.otlp(cli)? {
        let exporter = match protocol {
            Protocol::Grpc => opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .with_protocol(protocol)
                .with_timeout(timeout)
                .build()?,
            Protocol::HttpBinary | Protocol::HttpJson => {
                opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .with_endpoint(endpoint)
                    .with_protocol(protocol)
                    .with_timeout(timeout)
                    .build()?
            }
        };
        provider_builder = provider_builder.with_batch_exporter(exporter);
    }

    Ok(provider_builder.build())
}
