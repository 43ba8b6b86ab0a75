// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Portico - plugin discovery and deployment runtime.
//!
//! This is the binary entry point.

mod deploy;
mod plugins;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use portico_config::PorticoConfig;

/// Portico - plugin discovery and deployment runtime.
#[derive(Parser, Debug)]
#[command(name = "portico", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the standard lookup.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover plugins and list the inventory.
    Plugins {
        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Discover plugins, then deploy them in dependency order.
    Deploy,
}

fn load_config(path: Option<&PathBuf>) -> PorticoConfig {
    let loaded = match path {
        Some(path) => portico_config::load_and_validate_path(path),
        None => portico_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            portico_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("portico={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    init_tracing(&config.log_level);

    let result = match cli.command {
        Some(Commands::Plugins { json }) => plugins::run_plugins(config, json).await,
        Some(Commands::Deploy) => deploy::run_deploy(config).await,
        None => {
            println!("portico: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
