use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use golsplit_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod controller;

#[derive(Parser)]
#[command(name = "golsplit", version)]
#[command(about = "Autosplitter for Lara Croft and the Guardian of Light")]
struct Cli {
    /// Settings file
    #[arg(short, long, default_value = "golsplit.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Track the game and drive the run timer (default)
    Run,
    /// Attach once and print every value the tracker reads
    Probe {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which level a map id belongs to
    Zone {
        /// Map id as found in game memory, e.g. alc_1_it_beginning
        map_id: String,
    },
    /// Print or write the memory layout as JSON
    Layout {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("golsplit=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let config = Config::load_or_default(&cli.config);
            commands::tracking::run(&config)
        }
        Command::Probe { json } => {
            let config = Config::load_or_default(&cli.config);
            commands::probe::run(&config, json)
        }
        Command::Zone { map_id } => commands::zone::run(&map_id),
        Command::Layout { output } => {
            let config = Config::load_or_default(&cli.config);
            commands::layout::run(&config, output.as_deref())
        }
    }
}
