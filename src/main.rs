//! docsync - keeps machine-translated documentation trees in step with their
//! source language.
//!
//! Each translated file carries the MD5 of the source it was made from, so
//! unchanged sources are never sent to the provider twice.

mod commands;
mod config;
mod error;
mod model;
mod output;
mod services;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{RunArgs, StatusArgs, TranslateArgs};
use error::CliError;
use output::Output;

#[derive(Parser)]
#[command(name = "docsync", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate one source tree into one target language.
    Translate(TranslateArgs),
    /// Run every job from docsync.toml (or the built-in language list).
    Run(RunArgs),
    /// List translations that are missing or older than their source.
    Status(StatusArgs),
}

impl Commands {
    fn execute(self, output: &Output) -> Result<(), CliError> {
        match self {
            Commands::Translate(args) => args.execute(output),
            Commands::Run(args) => args.execute(output),
            Commands::Status(args) => args.execute(output),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // RUST_LOG wins; otherwise per-file progress at info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = cli.command.execute(&output) {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
