use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ember_config::load_app_config;
use ember_gateway::GatewayServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ember", about = "Ember - companion chat service", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "ember.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway (HTTP API + inactivity watcher).
    Serve {
        /// Override the configured port.
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut config = load_app_config(&cli.config)?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.gateway.port = port;
            }
            info!(version = env!("CARGO_PKG_VERSION"), "starting ember");
            GatewayServer::new(config)?.run().await?;
        }
    }

    Ok(())
}
