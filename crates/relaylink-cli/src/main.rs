//! relaylink CLI
//!
//! Drives relay lines high, finds the broker by broadcast and holds an MQTT
//! session until interrupted, reconnecting when the broker drops it.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::Config;
use relaylink_core::{MqttConnector, Shutdown, start};
use relaylink_gpio::{DriverKind, open_driver};

/// relaylink - relay controller agent
#[derive(Parser)]
#[command(name = "relaylink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize relays, connect to the broker and run until Ctrl+C
    Run {
        /// Comma-separated relay pins (overrides environment and config file)
        #[arg(long)]
        relays: Option<String>,

        /// Output driver
        #[arg(long)]
        driver: Option<DriverKind>,
    },

    /// Locate the broker and print its address
    Discover,

    /// Print or write the default configuration
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_deref());
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load_or_default()?,
    };

    config.validate()?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    tracing::info!("relaylink v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run { relays, driver } => run_agent(&config, relays, driver).await,
        Commands::Discover => discover_broker(&config).await,
        Commands::Config { .. } => Ok(()),
    }
}

/// Run the agent until Ctrl+C
async fn run_agent(
    config: &Config,
    relays: Option<String>,
    driver: Option<DriverKind>,
) -> anyhow::Result<()> {
    let relays = config.resolve_relays(
        relays.as_deref(),
        std::env::var(&config.relays.env_var).ok(),
    );
    let driver_kind = driver.unwrap_or(config.relays.driver);
    let agent_config = config.agent_config(relays)?;

    tracing::info!(
        "Relays {:?} via {} driver",
        agent_config.relays,
        driver_kind
    );
    let driver = open_driver(driver_kind, &config.relays.sysfs_root, config.relays.chip_base)
        .with_context(|| format!("failed to open {driver_kind} output driver"))?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, shutting down");
            trigger.trigger();
        }
    });

    let connector = MqttConnector::new(config.mqtt_options());
    let mut ctx = match start(&agent_config, driver, connector, &shutdown).await {
        Ok(ctx) => ctx,
        Err(e) if e.is_cancelled() => {
            tracing::info!("Stopped before a broker connection was established");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Broker: {}", ctx.broker());
    println!("Relays: {:?}", ctx.relays().pins());
    println!("Press Ctrl+C to stop");

    // Reconnects to the same broker whenever the session drops
    let held = ctx.hold(&shutdown).await;
    ctx.close().await?;
    held?;
    Ok(())
}

/// Run discovery only
async fn discover_broker(config: &Config) -> anyhow::Result<()> {
    let discovery = config.discovery_config()?;
    let endpoint = relaylink_discovery::discover(&discovery).await?;
    println!("{endpoint}");
    Ok(())
}

/// Print or save the default configuration
fn write_default_config(output: Option<&std::path::Path>) -> anyhow::Result<()> {
    let config = Config::default();
    match output {
        Some(path) => {
            config.save(path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        None => print!("{}", config.to_toml()?),
    }
    Ok(())
}
