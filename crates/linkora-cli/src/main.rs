//! Linkora CLI - keep bookmark folders, links and panels in sync
//!
//! One-shot or live synchronization of the local store with a Linkora server.

mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::config::run_config;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "linkora=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Sync => run_sync(&resolve_db_path(cli.db_path)?, profile).await,
        Commands::Watch => run_watch(&resolve_db_path(cli.db_path)?, profile).await,
        Commands::Status { json } => run_status(&resolve_db_path(cli.db_path)?, json).await,
        Commands::Config { command } => run_config(command, profile),
    }
}
