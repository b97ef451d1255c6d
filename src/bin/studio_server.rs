//! E-paper studio server: HTTP API, live updates, and the daily trigger.

use clap::Parser;
use epd_studio::server::StudioServer;
use epd_studio::{Studio, StudioConfig};
use std::path::PathBuf;
use tracing::info;

/// Prompt-driven image generation for colour e-paper panels.
#[derive(Parser)]
#[command(name = "epd-studio", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    epd_studio::logging::init("info");
    let cli = Cli::parse();

    let mut config = StudioConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let studio = Studio::from_config(&config)?;
    if studio.arm_scheduler(config.schedule_config()?) {
        info!("{}", config.schedule_config()?);
    } else {
        info!("automatic generation is off");
    }

    let server = StudioServer::start(studio.app_state(), &config.bind_addr()).await?;
    info!("API available at {}", server.api_url());

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    studio.scheduler().shutdown();
    server.shutdown().await;
    Ok(())
}
