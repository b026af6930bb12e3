//! Bantam static site hosting CLI.
//!
//! Deploys files and directories to Bantam, and manages the projects,
//! custom domains and credentials of the current user.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

/// Remote hosting API client.
mod api;

/// Directory archiving.
mod archiver;

/// CLI definition and subcommand implementations.
mod commands;

/// Stored session and per-invocation context.
mod config;

/// Deployment pipeline.
mod deploy;

/// Terminal output helpers.
mod display;

/// Interactive user prompts.
mod prompt;

/// Test doubles shared between modules.
#[cfg(test)]
mod testing;

use std::process::ExitCode;

use clap::Parser;
use common::{config::Logging, logging};
use tracing::{debug, level_filters::LevelFilter};

use crate::{
    commands::{Cli, Commands},
    config::{Context, SessionStore},
    prompt::TerminalPrompter,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging_config = Logging::from_env().unwrap_or_default();

    if cli.debug {
        logging::init_with_level(&logging_config, LevelFilter::DEBUG);
    } else {
        logging::init(&logging_config);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            display::error(error);
            ExitCode::FAILURE
        }
    }
}

/// Load the session and dispatch the selected subcommand.
async fn run(cli: Cli) -> Result<(), anyhow::Error> {
    let store = match cli.config {
        Some(path) => SessionStore::at(path),
        None => SessionStore::new()?,
    };

    debug!(path = %store.path().display(), "loading session");
    let mut context = Context::load(store)?;

    match cli.command {
        Commands::Deploy(args) => commands::deploy(args, &context, &TerminalPrompter).await?,
        Commands::Login(args) => commands::login(args, &mut context, &TerminalPrompter).await?,
        Commands::Logout => commands::logout(&mut context)?,
        Commands::List(args) => commands::list(args, &context).await?,
        Commands::Delete(args) => commands::delete(args, &context, &TerminalPrompter).await?,
        Commands::Whoami => commands::whoami(&context).await?,
        Commands::Domains(args) => commands::domains(args, &context).await?,
    }

    Ok(())
}
