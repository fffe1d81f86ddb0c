//! Keyforge CLI - build-matrix and emulation-test orchestrator for keyboard firmware

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use keyforge::core::errors::ConfigError;
use keyforge::util::diagnostic::emit;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stderr().is_terminal();

    if let Err(e) = run(cli, color) {
        match e.downcast::<ConfigError>() {
            // Malformed combo records are shown with their source snippet.
            Ok(ConfigError::ComboParse(err)) if color => eprintln!("{:?}", miette::Report::new(err)),
            Ok(config_err) => emit(&config_err.to_diagnostic(), color),
            Err(e) => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, color: bool) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("keyforge=debug")
    } else {
        EnvFilter::new("keyforge=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(color)
        .with_target(false)
        .without_time()
        .init();

    let global = commands::GlobalFlags {
        verbose: cli.verbose,
        color,
    };

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &global),
        Commands::Test(args) => commands::test::execute(args, &global),
        Commands::Limits(args) => commands::limits::execute(args, &global),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
