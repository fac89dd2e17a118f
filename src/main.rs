//! Tandem command-line entry point
//!
//! Loads the configuration, installs logging and runs one subcommand
//! against a simulated device layout.

use std::{error::Error, process};

use clap::Parser;
use tracing::{debug, instrument};
use tandem::{
    cli::{Cli, CliError, execute, formatting::format_error, load_hardware},
    config::Config,
    tracing_config,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_error(&e.to_string()));
            process::exit(1);
        }
    };

    let _guard = tracing_config::init(config.general.log_level, config.general.log_to_file)?;

    match run(&cli, &config).await {
        Ok(output) => {
            if !output.trim().is_empty() {
                println!("{output}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format_error(&e.to_string()));
            process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    Ok(config)
}

#[instrument(skip_all, fields(command = ?cli.command))]
async fn run(cli: &Cli, config: &Config) -> Result<String, CliError> {
    let hardware = match (&cli.hardware, cli.command.needs_hardware()) {
        (Some(path), true) => Some(load_hardware(path)?),
        _ => None,
    };
    debug!("Running command");
    execute(&cli.command, config, hardware).await
}
