//! Error types for linkora-core

use thiserror::Error;

/// Result type alias using linkora-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in linkora-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error (connection refused, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-2xx status
    #[error("Server error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Live event channel error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// A local entity references something the server does not know yet
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),
}

impl Error {
    /// Whether the server reported the requested resource as missing.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. } | Self::NotFound(_))
    }
}
