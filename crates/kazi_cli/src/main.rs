//! `kazi` command-line entry point.
//!
//! # Responsibility
//! - Resolve configuration, start file logging when configured, and open
//!   the catalog database.
//! - Hand the parsed command to its handler and map failures to exit code 1.

mod args;
mod commands;

use anyhow::{Context as _, Result};
use args::{Cli, Command};
use kazi_core::{init_logging, open_db_with, KaziConfig};
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if matches!(cli.command, Command::Ping | Command::Version) {
        return commands::dispatch_without_db(cli.command);
    }

    let mut config = match &cli.config {
        Some(path) => KaziConfig::load(path)?,
        None => KaziConfig::default(),
    };
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    if let Some(log_dir) = &config.log_dir {
        let log_dir = log_dir
            .to_str()
            .context("log_dir must be valid UTF-8")?;
        init_logging(config.effective_log_level()?, log_dir)?;
    }

    let mut conn = open_db_with(&config.database_path, config.open_options()).with_context(
        || format!("failed to open `{}`", config.database_path.display()),
    )?;
    commands::dispatch(&mut conn, cli.command)
}
