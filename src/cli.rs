use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/*
 * ============================================================================
 * Cli
 * ============================================================================
 */
#[allow(clippy::module_name_repetitions)]
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: CliCommands,

    /// Service name reported to the OpenTelemetry collector.
    #[arg(
        long,
        env = "OTEL_SERVICE_NAME",
        default_value = "ssh-access-operator",
        global = true
    )]
    pub otel_service_name: String,

    /// Exporters used for logs.
    #[arg(long, env = "OTEL_LOGS_EXPORTER", value_delimiter = ',', global = true)]
    pub otel_logs_exporter: Option<Vec<CliArgsOtelExporter>>,

    /// Exporters used for metrics.
    #[arg(
        long,
        env = "OTEL_METRICS_EXPORTER",
        value_delimiter = ',',
        global = true
    )]
    pub otel_metrics_exporter: Option<Vec<CliArgsOtelExporter>>,

    /// Exporters used for traces.
    #[arg(long, env = "OTEL_TRACES_EXPORTER", value_delimiter = ',', global = true)]
    pub otel_traces_exporter: Option<Vec<CliArgsOtelExporter>>,

    /// Base endpoint for all signals.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", global = true)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    #[arg(long, env = "OTEL_EXPORTER_OTLP_LOGS_ENDPOINT", global = true)]
    pub otel_exporter_otlp_logs_endpoint: Option<String>,

    #[arg(long, env = "OTEL_EXPORTER_OTLP_METRICS_ENDPOINT", global = true)]
    pub otel_exporter_otlp_metrics_endpoint: Option<String>,

    #[arg(long, env = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT", global = true)]
    pub otel_exporter_otlp_traces_endpoint: Option<String>,

    /// Transport protocol for all signals.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_PROTOCOL", value_enum, global = true)]
    pub otel_exporter_otlp_protocol: Option<CliArgsOtelExporterOtlpProtocol>,

    #[arg(
        long,
        env = "OTEL_EXPORTER_OTLP_LOGS_PROTOCOL",
        value_enum,
        global = true
    )]
    pub otel_exporter_otlp_logs_protocol: Option<CliArgsOtelExporterOtlpProtocol>,

    #[arg(
        long,
        env = "OTEL_EXPORTER_OTLP_METRICS_PROTOCOL",
        value_enum,
        global = true
    )]
    pub otel_exporter_otlp_metrics_protocol: Option<CliArgsOtelExporterOtlpProtocol>,

    #[arg(
        long,
        env = "OTEL_EXPORTER_OTLP_TRACES_PROTOCOL",
        value_enum,
        global = true
    )]
    pub otel_exporter_otlp_traces_protocol: Option<CliArgsOtelExporterOtlpProtocol>,

    /// Export timeout in milliseconds for all signals.
    #[arg(
        long,
        env = "OTEL_EXPORTER_OTLP_TIMEOUT",
        default_value_t = 10_000,
        global = true
    )]
    pub otel_exporter_otlp_timeout: u64,

    #[arg(long, env = "OTEL_EXPORTER_OTLP_LOGS_TIMEOUT", global = true)]
    pub otel_exporter_otlp_logs_timeout: Option<u64>,

    #[arg(long, env = "OTEL_EXPORTER_OTLP_METRICS_TIMEOUT", global = true)]
    pub otel_exporter_otlp_metrics_timeout: Option<u64>,

    #[arg(long, env = "OTEL_EXPORTER_OTLP_TRACES_TIMEOUT", global = true)]
    pub otel_exporter_otlp_traces_timeout: Option<u64>,
}

#[must_use]
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[allow(clippy::module_name_repetitions)]
#[derive(Subcommand, Debug)]
pub enum CliCommands {
    /// Controller
    Controller(ControllerArgs),

    /// Custom Resource Definition
    Crd(CrdArgs),

    /// Markdown
    Markdown(MarkdownArgs),
}

#[allow(clippy::module_name_repetitions)]
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliArgsOtelExporter {
    Console,
    Otlp,
}

#[allow(clippy::module_name_repetitions)]
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliArgsOtelExporterOtlpProtocol {
    Grpc,
    #[value(name = "http/protobuf")]
    HttpProtobuf,
    #[value(name = "http/json")]
    HttpJson,
}

impl From<CliArgsOtelExporterOtlpProtocol> for opentelemetry_otlp::Protocol {
    fn from(value: CliArgsOtelExporterOtlpProtocol) -> Self {
        match value {
            CliArgsOtelExporterOtlpProtocol::Grpc => opentelemetry_otlp::Protocol::Grpc,
            CliArgsOtelExporterOtlpProtocol::HttpProtobuf => {
                opentelemetry_otlp::Protocol::HttpBinary
            }
            CliArgsOtelExporterOtlpProtocol::HttpJson => opentelemetry_otlp::Protocol::HttpJson,
        }
    }
}

/*
 * ============================================================================
 * Controller
 * ============================================================================
 */
#[derive(Args, Debug)]
pub struct ControllerArgs {
    #[command(subcommand)]
    pub command: ControllerCommands,
}

#[derive(Subcommand, Debug)]
pub enum ControllerCommands {
    /// Run
    Run(ControllerRunArgs),
}

#[derive(Args, Debug)]
pub struct ControllerRunArgs {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Seconds between reconciliations of an unchanged `SshAccess`.
    #[arg(long, default_value_t = 3600)]
    pub requeue_interval_seconds: u64,
}

/*
 * ============================================================================
 * Custom Resource Document
 * ============================================================================
 */
#[derive(Args, Debug)]
pub struct CrdArgs {
    #[command(subcommand)]
    pub command: CrdCommands,
}

#[derive(Subcommand, Debug)]
pub enum CrdCommands {
    /// Generate
    Generate(CrdGenerateArgs),
}

#[derive(Args, Debug)]
pub struct CrdGenerateArgs {
    #[arg(long, value_enum, default_value_t = CrdGenerateArgsFormat::Yaml)]
    pub format: CrdGenerateArgsFormat,

    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum CrdGenerateArgsFormat {
    Json,
    Yaml,
}

/*
 * ============================================================================
 * Markdown
 * ============================================================================
 */
#[derive(Args, Debug)]
pub struct MarkdownArgs {
    #[command(subcommand)]
    pub command: MarkdownCommands,
}

#[derive(Subcommand, Debug)]
pub enum MarkdownCommands {
    /// Generate
    Generate(MarkdownGenerateArgs),
}

#[derive(Args, Debug)]
pub struct MarkdownGenerateArgs {
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{
        CliArgs, CliArgsOtelExporter, CliCommands, ControllerCommands, CrdCommands,
        CrdGenerateArgsFormat,
    };

    #[test]
    fn verify_command() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn controller_run_defaults() {
        // act
        let cli = CliArgs::try_parse_from(["ssh-access-operator", "controller", "run"]).unwrap();

        // assert
        let CliCommands::Controller(controller) = cli.command else {
            panic!("expected controller command");
        };
        let ControllerCommands::Run(run) = controller.command;
        assert_eq!("127.0.0.1", run.host);
        assert_eq!(8080, run.port);
        assert_eq!(3600, run.requeue_interval_seconds);
    }

    #[test]
    fn crd_generate_with_exporters() {
        // act
        let cli = CliArgs::try_parse_from([
            "ssh-access-operator",
            "crd",
            "generate",
            "--format",
            "json",
            "--otel-logs-exporter",
            "console,otlp",
        ])
        .unwrap();

        // assert
        assert_eq!(
            Some(vec![CliArgsOtelExporter::Console, CliArgsOtelExporter::Otlp]),
            cli.otel_logs_exporter
        );
        let CliCommands::Crd(crd) = cli.command else {
            panic!("expected crd command");
        };
        let CrdCommands::Generate(generate) = crd.command;
        assert!(matches!(generate.format, CrdGenerateArgsFormat::Json));
        assert_eq!(None, generate.output);
    }
}
