// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lookalike - perceptual-hash image database.
//!
//! This is the binary entry point. Every subcommand reads the layered
//! configuration and works on the configured database file.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod backup;
mod init;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lookalike_config::LookalikeConfig;

/// Lookalike - perceptual-hash image database.
#[derive(Parser, Debug)]
#[command(name = "lookalike", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the usual locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database file and its tables.
    Init,
    /// Copy the database file to `<database_path>.bak`.
    Backup,
    /// Show database location and record counts.
    Status {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            lookalike_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.log.level);

    let result = match cli.command {
        Some(Commands::Init) => init::run_init(&config.storage).await,
        Some(Commands::Backup) => backup::run_backup(&config.storage).await,
        Some(Commands::Status { json }) => status::run_status(&config.storage, json).await,
        None => {
            println!("lookalike: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("lookalike: {e}");
        std::process::exit(1);
    }
}

fn load_config(
    path: Option<&std::path::Path>,
) -> Result<LookalikeConfig, Vec<lookalike_config::ConfigError>> {
    match path {
        Some(path) => lookalike_config::load_and_validate_path(path),
        None => lookalike_config::load_and_validate(),
    }
}

/// Initializes the tracing subscriber; `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lookalike={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
