//! # Takoyaki Vision CLI (`tako`)
//!
//! The `tako` binary runs the inventory backend. All commands accept a
//! `--config` flag pointing to a TOML file; a missing file falls back to
//! built-in defaults, so the server runs with zero setup.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tako init` | Create the data files and seed the default inventory |
//! | `tako serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Seed storage under ./data
//! tako init
//!
//! # Serve with the deterministic mock collaborator
//! MOCK_VISION=1 tako serve
//!
//! # Serve against the live model on a custom port
//! OPENAI_API_KEY=sk-... PORT=9000 tako serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use takoyaki_vision::reports::ReportLog;
use takoyaki_vision::store::StateStore;
use takoyaki_vision::{config, server};

/// Takoyaki Vision — photo-driven inventory tracking for a takoyaki stall.
#[derive(Parser)]
#[command(
    name = "tako",
    about = "Takoyaki Vision — photo-driven inventory tracking backend",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file falls back to defaults.
    #[arg(long, global = true, default_value = "./config/tako.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize storage: create the data files and seed the default
    /// inventory. Idempotent — running it again is safe.
    Init,

    /// Start the HTTP API server.
    ///
    /// Binds to `[server].bind` (or the `PORT` environment override) and
    /// serves the inventory, report, and vision-analysis endpoints.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = StateStore::json_file(cfg.storage.state_path());
            let state = store.initialize()?;
            let reports = ReportLog::json_file(cfg.storage.reports_path());
            reports.initialize()?;
            println!(
                "Storage initialized in {} ({} inventory items).",
                cfg.storage.data_dir.display(),
                state.inventory.len()
            );
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
