// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Forecourt - customer notification dispatch for garage management.
//!
//! Binary entry point: config loading, CLI dispatch, and the serve loop.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod serve;

/// Forecourt - customer notification dispatch for garage management.
#[derive(Parser, Debug)]
#[command(name = "forecourt", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the notification service.
    Serve,
    /// Print the effective configuration and exit.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match forecourt_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            forecourt_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run(config).await {
                eprintln!("forecourt: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("forecourt: failed to render config: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("forecourt: use --help for available commands");
        }
    }
}
