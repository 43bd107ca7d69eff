// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Session;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let session = Session::open(&cli.universe, cli.config.as_deref())?;
    let format = cli.format.as_str();

    match cli.command {
        Commands::Match {
            atom,
            multi,
            multi_repo,
            no_mask,
            slot,
        } => commands::cmd_match(
            &session,
            &atom,
            multi,
            multi_repo,
            no_mask,
            slot.as_deref(),
            format,
        ),
        Commands::Install {
            atoms,
            deep,
            empty_deps,
            timeout_ms,
        } => commands::cmd_install(&session, &atoms, deep, empty_deps, timeout_ms, format),
        Commands::Remove { atoms, deep } => commands::cmd_remove(&session, &atoms, deep, format),
        Commands::Updates { branch } => commands::cmd_updates(&session, branch.as_deref(), format),
        Commands::World { branch, deep } => {
            commands::cmd_world(&session, branch.as_deref(), deep, format)
        }
        Commands::Check => commands::cmd_check(&session, format),
    }
}
