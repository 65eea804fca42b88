//! Correlation tags and client identity.
//!
//! Every mutation sent to the server carries a [`Correlation`]. The server
//! broadcasts the resulting event to every client, the originator included,
//! and the originator recognises its own tag and drops the echo.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one outgoing operation and the client that sent it.
///
/// This answers "did I originate this?" and nothing more; it carries no
/// ordering information.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    pub id: String,
    pub client_name: String,
}

/// The current client's identity, passed explicitly to the store, reconciler
/// and orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity {
    client_name: String,
}

impl ClientIdentity {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    /// Generate a fresh identity for a client that has never synced.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(format!("{}-{}", std::env::consts::OS, Uuid::now_v7()))
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Stamp a new outgoing operation.
    #[must_use]
    pub fn tag(&self) -> Correlation {
        Correlation {
            id: Uuid::now_v7().to_string(),
            client_name: self.client_name.clone(),
        }
    }

    /// Whether this client sent the operation carrying `correlation`.
    pub fn originated(&self, correlation: &Correlation) -> bool {
        correlation.client_name == self.client_name
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.client_name)
    }
}
