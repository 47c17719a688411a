use std::{fs::File, io::Write, net::SocketAddr, time::Duration};

use ssh_access_operator::{
    cli::{
        CliArgs, CliCommands, ControllerCommands, ControllerRunArgs, CrdCommands,
        CrdGenerateArgs, CrdGenerateArgsFormat, MarkdownCommands, MarkdownGenerateArgs, parse,
    },
    http_server,
    metrics::Metrics,
    otel,
    ssh_access::{self, generate_custom_resource_definition},
};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = &parse();

    match &cli.command {
        CliCommands::Controller(controller) => match &controller.command {
            ControllerCommands::Run(run) => controller_run(cli, run).await,
        },
        CliCommands::Crd(crd) => match &crd.command {
            CrdCommands::Generate(generate) => crd_generate(generate),
        },
        CliCommands::Markdown(markdown) => match &markdown.command {
            MarkdownCommands::Generate(generate) => markdown_generate(generate),
        },
    }
}

async fn controller_run(cli: &CliArgs, run: &ControllerRunArgs) -> Result<(), BoxError> {
    let provider = otel::Provider::new(cli)?;
    provider.init_tracing_subscriber()?;

    let addr: SocketAddr = format!("{}:{}", run.host, run.port).parse()?;
    let metrics = Metrics::new(provider.meter());
    let client = kube::Client::try_default().await?;

    let config = ssh_access::Config {
        requeue_interval: Duration::from_secs(run.requeue_interval_seconds),
    };

    let result = tokio::select! {
        result = http_server::run(addr) => result.map_err(Into::into),
        () = ssh_access::run_controller(client, config, metrics) => Ok(()),
    };

    provider.shutdown()?;

    result
}

fn crd_generate(generate: &CrdGenerateArgs) -> Result<(), BoxError> {
    let crd = generate_custom_resource_definition();

    let content = match generate.format {
        CrdGenerateArgsFormat::Json => serde_json::to_string_pretty(&crd)?,
        CrdGenerateArgsFormat::Yaml => serde_yaml::to_string(&crd)?,
    };

    write_output(
        generate.output.as_ref().map(|output| match generate.format {
            CrdGenerateArgsFormat::Json => output.join("sshaccess.json"),
            CrdGenerateArgsFormat::Yaml => output.join("sshaccess.yaml"),
        }),
        &content,
    )
}

fn markdown_generate(generate: &MarkdownGenerateArgs) -> Result<(), BoxError> {
    let content = clap_markdown::help_markdown::<CliArgs>();

    write_output(generate.output.clone(), &content)
}

fn write_output(path: Option<std::path::PathBuf>, content: &str) -> Result<(), BoxError> {
    if let Some(path) = path {
        File::create(path)?.write_all(content.as_bytes())?;
    } else {
        print!("{content}");
    }

    Ok(())
}
