//! Main binary for the AMD exporter daemon (amd-exporterd)

use clap::{Parser, Subcommand};
use exporter_agent::{init_logging, Exporter, ExporterConfig, Result};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "amd-exporterd")]
#[command(about = "Exports AMD CPU and GPU telemetry to Prometheus")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level: development, production or a tracing level
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Port the metrics endpoint listens on
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the exporter
    Start,
    /// Print the effective configuration
    Config,
    /// Validate the configuration and exit
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Some(Commands::Config) => print_config(&config),
        Some(Commands::Validate) => {
            println!("Configuration is valid");
            Ok(())
        }
        Some(Commands::Start) | None => start_exporter(config).await,
    }
}

fn load_config(cli: &Cli) -> Result<ExporterConfig> {
    let mut config = ExporterConfig::load(cli.config.as_deref())?;

    if let Some(ref log_level) = cli.log_level {
        config.log_level = log_level.clone();
    }

    if let Some(port) = cli.port {
        config.web_server_port = port;
    }

    config.validate()?;
    Ok(config)
}

fn print_config(config: &ExporterConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(config)?;
    println!("{}", yaml);
    Ok(())
}

async fn start_exporter(config: ExporterConfig) -> Result<()> {
    init_logging(&config)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting AMD exporter");
    tracing::debug!("Configuration parameters: {:?}", config);

    let exporter = match Exporter::build(config).await {
        Ok(exporter) => exporter,
        Err(e) => {
            error!("Unable to start exporter: {}", e);
            return Err(e);
        }
    };

    info!("Starting web server on port {}", exporter.config().web_server_port);
    if let Err(e) = exporter.run().await {
        error!("Exporter failed: {}", e);
        return Err(e);
    }

    Ok(())
}
