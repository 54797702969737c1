//! NSP alarm ingester entry point

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use nsp_alarm_ingester::{
    config::NspConfig, store::AlarmStore, supervisor::Supervisor, utils::logger::setup_logging, Result,
};

#[derive(Parser)]
#[command(name = "nsp-alarm-ingester")]
#[command(about = "Alarm ingestion and correlation pipeline for an NSP notification bus")]
#[command(version = nsp_alarm_ingester::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the ingester (default)
    Start,
    /// Validate configuration and exit
    ValidateConfig,
    /// Generate default configuration
    GenerateConfig {
        /// Output file path; prints to stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::GenerateConfig { output }) = &cli.command {
        return generate_default_config(output.clone());
    }

    let config = load_configuration(&cli)?;
    setup_logging(&config.logging)?;

    info!("starting {} v{}", nsp_alarm_ingester::NAME, nsp_alarm_ingester::VERSION);

    match &cli.command {
        Some(Commands::ValidateConfig) => {
            println!("configuration is valid");
            println!("  server host: {}", config.server.host);
            println!("  database url: {}", config.database.url);
            println!("  bus group id: {}", config.bus.group_id);
            println!("  timezone: {}", config.pipeline.timezone);

            let store = AlarmStore::connect(&config.database.url).await?;
            let active_count = store.active_count().await?;
            println!("  database reachable, active alarms: {active_count}");
            Ok(())
        }
        Some(Commands::Start) | None => {
            let supervisor = Arc::new(Supervisor::new(config));
            supervisor.run().await
        }
        Some(Commands::GenerateConfig { .. }) => unreachable!("handled above"),
    }
}

fn load_configuration(cli: &Cli) -> Result<NspConfig> {
    let config = if let Some(path) = &cli.config {
        NspConfig::load_from_file(path)?
    } else {
        match NspConfig::load_from_env() {
            Ok(config) => config,
            Err(_) => NspConfig::default_config(),
        }
    };

    config.validate()?;
    Ok(config)
}

fn generate_default_config(output_path: Option<PathBuf>) -> Result<()> {
    let config = NspConfig::default_config();
    let toml_content = toml::to_string_pretty(&config)
        .map_err(|e| nsp_alarm_ingester::Error::internal(format!("failed to serialize config: {e}")))?;

    match output_path {
        Some(path) => {
            std::fs::write(&path, toml_content)?;
            println!("default configuration written to: {}", path.display());
        }
        None => println!("{toml_content}"),
    }
    Ok(())
}
