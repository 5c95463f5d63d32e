//! `heartlink`: stream heart rate from a BLE monitor.

mod cli;
mod commands;
mod config;
mod format;

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::{WatchOptions, cmd_config, cmd_watch};
use crate::config::{Config, resolve_central};
use crate::format::FormatOptions;

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "heartlink", &mut io::stdout());
        return Ok(());
    }

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Watch(args) => {
            let config = Config::load();
            let central = resolve_central(&args, &config);
            let opts = WatchOptions {
                count: args.count,
                json: args.json,
                format: FormatOptions::new(cli.no_color || config.no_color),
            };
            cmd_watch(central, opts).await
        }
        Commands::Config { action } => cmd_config(action),
        Commands::Completions { .. } => unreachable!("handled before tracing init"),
    }
}
