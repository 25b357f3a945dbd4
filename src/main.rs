use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use switchyard::channels::ChannelRegistry;
use switchyard::config::{load_config, RouterConfig};
use switchyard::lifecycle::{default_channels, Shutdown, Switchyard};
use switchyard::observability::{logging, metrics};

/// How long sources get to stop after Ctrl+C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "switchyard", version)]
#[command(about = "Routes events between HTTP, IRC and other channels", long_about = None)]
struct Cli {
    /// Configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long, env = "SWITCHYARD_CONFIG", default_value = "switchyard.toml")]
    config: PathBuf,

    /// Log level, overriding the configuration. RUST_LOG wins over both.
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the router (default)
    Run,
    /// Validate the configuration and exit
    Check,
    /// Describe the available channels and their arguments
    Channels,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    logging::init_logging(&level, config.observability.json_logs)?;

    tracing::info!(
        config = %cli.config.display(),
        sources = config.sources.len(),
        routes = config.routes.len(),
        "switchyard v{} configuration loaded",
        env!("CARGO_PKG_VERSION")
    );

    let channels = default_channels(&config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Check => {
            println!("Configuration OK: {}", cli.config.display());
            Ok(())
        }
        Commands::Channels => {
            describe_channels(&config, &channels);
            Ok(())
        }
        Commands::Run => run(config, channels).await,
    }
}

async fn run(config: RouterConfig, channels: ChannelRegistry) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let app = Switchyard::new(config, channels);
    let shutdown = Shutdown::new();
    let tasks = app.start(&shutdown).await;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.trigger();

    for task in tasks {
        if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
            tracing::warn!("Source channel did not stop in time");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn describe_channels(config: &RouterConfig, channels: &ChannelRegistry) {
    let mut names: Vec<&str> = channels.source_names().chain(channels.sink_names()).collect();
    names.sort_unstable();
    names.dedup();

    for name in names {
        println!("{}", name);

        if let Ok(source) = channels.source(name) {
            println!("  {}", source.description());
            println!("  source args:");
            for arg in source.source_args() {
                println!("    {:<18} {}{}", arg.name, arg.description, arg_suffix(arg.required, arg.default));
            }
            for source_config in config.sources.iter().filter(|s| s.pub_channel_name.as_deref() == Some(name)) {
                for info in source.source_info(&source_config.pub_channel_args) {
                    println!("    [{}] {}: {} ({})", source_config.name, info.name, info.value, info.description);
                }
            }
        }

        if let Ok(sink) = channels.sink(name) {
            if channels.source(name).is_err() {
                println!("  {}", sink.description());
            }
            println!("  sink args:");
            for arg in sink.sink_args() {
                println!("    {:<18} {}{}", arg.name, arg.description, arg_suffix(arg.required, arg.default));
            }
        }
    }
}

fn arg_suffix(required: bool, default: Option<&str>) -> String {
    match (required, default) {
        (_, Some(default)) if !default.is_empty() => format!(" (default: {})", default),
        (true, _) => " (required)".to_string(),
        _ => String::new(),
    }
}
