use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "linkora")]
#[command(about = "Keep Linkora bookmarks in sync with your server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for server configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Flush pending changes and pull everything new, once
    Sync,
    /// Sync, then follow live server events until Ctrl-C
    Watch,
    /// Show local sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure server profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Base URL of the Linkora server
        #[arg(long, value_name = "URL")]
        server_url: String,
        /// Bearer token for the server
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print configured profiles
    Show,
}
