// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! DVR - An always-on recording scheduler.
//!
//! This is the binary entry point for the DVR daemon and its tooling.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod loopback;
mod schedule;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dvr_config::DvrConfig;

/// DVR - An always-on recording scheduler.
#[derive(Parser, Debug)]
#[command(name = "dvr", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the standard hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scheduler until SIGINT or SIGTERM.
    Serve,
    /// Show scheduled recordings and recorded programs.
    Status {
        /// Output JSON for scripting.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Add a timed recording on a channel.
    Schedule(schedule::ScheduleArgs),
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> DvrConfig {
    let loaded = match path {
        Some(path) => dvr_config::load_and_validate_path(path),
        None => dvr_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            dvr_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Schedule(args)) => schedule::run_schedule(&config, &args).await,
        Some(Commands::CheckConfig) => {
            println!(
                "dvr: config ok ({} inputs, {} channels, database {})",
                config.inputs.len(),
                config.channels.len(),
                config.storage.database_path
            );
            Ok(())
        }
        None => {
            println!("dvr: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
