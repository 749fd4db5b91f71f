//! # cortex-bridge-cli
//!
//! Command-line runner for the cortex-bridge headset streaming layer.
//! Queries the Cortex service, connects headsets, and holds stream leases
//! while printing every sample as a JSON line on stdout. Diagnostics go to
//! stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod app;
mod commands;

use commands::{StreamArgs, cmd_connect, cmd_headsets, cmd_info, cmd_stream};

#[derive(Parser)]
#[command(name = "cortex-bridge-cli", version, about)]
struct Cli {
    /// Path to a cortex-bridge.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cortex API URL override
    #[arg(long, global = true)]
    url: Option<String>,

    /// Enable verbose logging (set RUST_LOG for fine-grained control)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Service, user and license information
    Info,
    /// List headsets known to Cortex
    Headsets {
        /// Ask Cortex to rescan before listing
        #[arg(long)]
        refresh: bool,
    },
    /// Drive a headset to `connected`
    Connect {
        /// Headset id, e.g. INSIGHT-5AF2E1B3
        headset_id: String,
    },
    /// Subscribe to streams and print samples as JSON lines until Ctrl+C
    Stream(StreamArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    app::init_logging(cli.verbose);

    let config = app::load_config(cli.config.as_deref(), cli.url.as_deref())?;

    match cli.command {
        Command::Info => cmd_info(config).await,
        Command::Headsets { refresh } => cmd_headsets(config, refresh).await,
        Command::Connect { headset_id } => cmd_connect(config, &headset_id).await,
        Command::Stream(args) => cmd_stream(config, args).await,
    }
}
