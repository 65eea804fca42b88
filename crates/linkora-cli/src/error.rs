use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] linkora_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Live sync stopped: {0}")]
    LiveSync(String),
    #[error(
        "No sync server is configured. Run `linkora config init --server-url <URL> --token <TOKEN>`, or set LINKORA_SERVER_URL and LINKORA_AUTH_TOKEN."
    )]
    ServerNotConfigured,
}
