//! Gateway bridge - Main Entry Point
//!
//! Runs the bridge as a standalone process. Outbound tasks are read as JSON
//! lines from stdin, inbound commands are written as JSON lines to stdout and
//! logs go to stderr.

use clap::{Parser, Subcommand};
use gateway_bridge::bridge::{inbound_queue, outbound_queue, BridgeService};
use gateway_bridge::config::BridgeConfig;
use gateway_bridge::host;
use gateway_bridge::observability::{init_logging_with_override, logging::level_from_verbosity};
use gateway_bridge::transport::mqtt::MqttAdapter;
use std::path::PathBuf;
use std::process;
use tokio::io::BufReader;
use tokio::signal;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

/// How long the stdout writer may take to flush after the bridge stops
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Bridge between gateway task queues and an MQTT broker
#[derive(Parser)]
#[command(name = "gateway-bridge")]
#[command(about = "Bridge gateway task queues to an MQTT broker")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge, piping tasks over stdin/stdout
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging_with_override(level_from_verbosity(cli.verbose));

    info!("Starting gateway bridge v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_bridge(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<BridgeConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(BridgeConfig::load_from_file(path)?);
    }

    for path_str in ["bridge.toml", "config/bridge.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(BridgeConfig::load_from_file(&path)?);
        }
    }

    Err("No configuration file found. Please provide one with -c/--config or create bridge.toml".into())
}

async fn run_bridge(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let adapter = MqttAdapter::from_config(&config)?;
    let (_, outbound) = outbound_queue();
    let (inbound_tx, inbound_rx) = inbound_queue();

    let handle = BridgeService::start(&config, adapter, outbound, inbound_tx).await?;

    let input = tokio::spawn(host::forward_tasks(
        BufReader::new(tokio::io::stdin()),
        handle.outbound(),
    ));
    let output = tokio::spawn(host::write_commands(inbound_rx, tokio::io::stdout()));

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    info!("Bridge is running, reading tasks from stdin");

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }

    input.abort();
    let stats = handle.close().await?;
    info!(stats = %stats, "Bridge statistics");

    // The loop dropped its inbound producer, so the writer ends after draining
    match timeout(OUTPUT_DRAIN_TIMEOUT, output).await {
        Ok(Ok(Ok(written))) => info!("Wrote {} commands to stdout", written),
        Ok(Ok(Err(e))) => warn!("Writing commands failed: {}", e),
        Ok(Err(e)) => warn!("Output task failed: {}", e),
        Err(_) => warn!("Output did not drain in time"),
    }

    Ok(())
}

fn handle_config_command(
    config: &BridgeConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(&config.redacted())?);
    }

    info!("Configuration validation complete");
    Ok(())
}
