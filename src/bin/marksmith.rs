//! Marksmith CLI Binary
//!
//! Command-line interface for the section-addressable Markdown store.

use anyhow::Context;
use clap::Parser;
use marksmith::logging::init_logging;
use marksmith::tooling::cli::{load_config, Cli, CliContext};
use marksmith::StoreError;
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let mut config = load_config(&cli.workspace, cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply_logging_overrides(&mut config);
    init_logging(&config.logging).context("Failed to initialize logging")?;

    let context = CliContext::with_config(cli.workspace.clone(), config)
        .context("Error initializing workspace")?
        .with_owner(cli.owner.clone());

    Ok(context.execute(&cli.command)?)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(store_err) = e.downcast_ref::<StoreError>() {
                for violation in store_err.violations() {
                    eprintln!("  {}", violation);
                }
            }
            process::exit(1);
        }
    }
}
