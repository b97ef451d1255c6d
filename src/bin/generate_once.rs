//! Run a single generate-and-display cycle with the configured prompt.
//!
//! Exits non-zero when the run ends in error.

use clap::Parser;
use epd_studio::{Phase, RunKind, Studio, StudioConfig};
use std::path::PathBuf;

/// Generate one image from the current prompt and show it on the panel.
#[derive(Parser)]
#[command(name = "epd-generate-once", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    epd_studio::logging::init("info");
    let cli = Cli::parse();

    let config = StudioConfig::load(cli.config.as_deref())?;
    let studio = Studio::from_config(&config)?;

    let orchestrator = studio.orchestrator();
    orchestrator.request_run(RunKind::Generate)?.wait().await;

    let outcome = orchestrator.state().snapshot();
    match outcome.phase {
        Phase::Complete => {
            if let Some(path) = &outcome.result_path {
                println!("{}", path.display());
            }
            Ok(())
        }
        _ => {
            let detail = outcome.error_detail.unwrap_or(outcome.message);
            anyhow::bail!("generation failed: {detail}")
        }
    }
}
