//! Seed data generator for the anime catalogue.
//!
//! This binary installs logging, loads layered settings and delegates to
//! `anime_seed::cli`, keeping every command testable without a process.

use std::io::{self, Write};
use std::process::ExitCode;

use anime_seed::SeedPathSettings;
use anime_seed::cli::{Cli, run};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
    {
        drop(err);
    }

    let cli = Cli::parse();
    let outcome = SeedPathSettings::load_layers()
        .map_err(anime_seed::SeedError::from)
        .and_then(|settings| run(&cli, &settings));
    match outcome {
        Ok(summary) => {
            if let Err(err) = writeln!(io::stdout().lock(), "{summary}") {
                drop(err);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            if let Err(write_err) = writeln!(io::stderr().lock(), "error: {err}") {
                drop(write_err);
            }
            ExitCode::FAILURE
        }
    }
}
