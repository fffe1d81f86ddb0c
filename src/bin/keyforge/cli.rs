//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Keyforge - build-matrix and emulation-test orchestrator for ZMK keyboard firmware
#[derive(Parser)]
#[command(name = "keyforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Derive combo limits, then build every firmware in the matrix
    Build(BuildArgs),

    /// Run emulation scenarios and compare their events to snapshots
    Test(TestArgs),

    /// Derive combo limits from the combo definitions
    Limits(LimitsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Build matrix to use instead of `build.matrix`
    #[arg(long, value_name = "PATH")]
    pub matrix: Option<PathBuf>,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Directory receiving the firmware files
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Print the resolved jobs as JSON without building
    #[arg(long)]
    pub plan: bool,

    /// Output format (human, json)
    #[arg(long, default_value = "human")]
    pub format: String,

    /// Leave the combo limits fragment untouched
    #[arg(long)]
    pub skip_limits: bool,
}

#[derive(Args)]
pub struct TestArgs {
    /// Scenario directories or ids to run (default: all)
    pub scenarios: Vec<String>,

    /// Run previously built executables instead of building
    #[arg(long)]
    pub no_build: bool,

    /// Replace mismatching snapshots with the new events
    #[arg(long)]
    pub auto_accept: bool,

    /// Number of scenarios run in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Output format (human, json)
    #[arg(long, default_value = "human")]
    pub format: String,
}

#[derive(Args)]
pub struct LimitsArgs {
    /// Combo definitions to read instead of `combos.artifact`
    #[arg(long, value_name = "PATH")]
    pub combos: Option<PathBuf>,

    /// Write the limits to the configuration fragment
    #[arg(long)]
    pub write: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
