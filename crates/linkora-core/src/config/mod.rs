//! Sync server configuration.
//!
//! The server a client talks to can be reconfigured while the app is running,
//! so transports never hold a `ServerConfig` directly. They ask a
//! [`ConnectionProvider`] on every request instead.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Late-bound source of the current server connection.
///
/// Returns `None` when no server is configured (local-only mode).
pub type ConnectionProvider = Arc<dyn Fn() -> Option<ServerConfig> + Send + Sync>;

/// Base URL and bearer token of a sync server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,
    pub auth_token: String,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ServerConfig")
            .field("base_url", &self.base_url)
            .field("auth_token", &"[REDACTED]")
            .finish()
    }
}

impl ServerConfig {
    /// Validate and normalize a server URL and token.
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Result<Self> {
        let base_url = normalize_server_url(base_url.into())?;
        let auth_token = normalize_text_option(Some(auth_token.into())).ok_or_else(|| {
            Error::InvalidInput("server auth token must not be empty".to_string())
        })?;
        Ok(Self {
            base_url,
            auth_token,
        })
    }

    /// Absolute URL for an HTTP route.
    pub fn route_url(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route.trim_start_matches('/'))
    }

    /// Absolute URL for the WebSocket route (`http` -> `ws`, `https` -> `wss`).
    pub fn socket_url(&self, route: &str) -> String {
        let http_url = self.route_url(route);
        if let Some(rest) = http_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = http_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            http_url
        }
    }
}

/// Provider that always yields the same configuration.
pub fn fixed_connection(config: ServerConfig) -> ConnectionProvider {
    Arc::new(move || Some(config.clone()))
}

/// Provider backed by a shared slot that can be swapped at runtime.
pub fn shared_connection(slot: Arc<RwLock<Option<ServerConfig>>>) -> ConnectionProvider {
    Arc::new(move || slot.read().ok().and_then(|guard| guard.clone()))
}

fn normalize_server_url(raw: String) -> Result<String> {
    let url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("server url must not be empty".to_string()))?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "server url must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_rejects_invalid_values() {
        assert!(ServerConfig::new("", "token").is_err());
        assert!(ServerConfig::new("sync.example.com", "token").is_err());
        assert!(ServerConfig::new("https://sync.example.com", "  ").is_err());
    }

    #[test]
    fn server_config_trims_trailing_slash() {
        let config = ServerConfig::new(" https://sync.example.com/ ", "token").unwrap();
        assert_eq!(config.base_url, "https://sync.example.com");
        assert_eq!(
            config.route_url("/sync/updates"),
            "https://sync.example.com/sync/updates"
        );
    }

    #[test]
    fn socket_url_switches_scheme() {
        let secure = ServerConfig::new("https://sync.example.com", "token").unwrap();
        assert_eq!(secure.socket_url("events"), "wss://sync.example.com/events");

        let plain = ServerConfig::new("http://localhost:8080", "token").unwrap();
        assert_eq!(plain.socket_url("events"), "ws://localhost:8080/events");
    }

    #[test]
    fn debug_redacts_token() {
        let config = ServerConfig::new("https://sync.example.com", "secret").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn shared_connection_sees_reconfiguration() {
        let slot = Arc::new(RwLock::new(None));
        let provider = shared_connection(Arc::clone(&slot));
        assert!(provider().is_none());

        *slot.write().unwrap() =
            Some(ServerConfig::new("https://sync.example.com", "token").unwrap());
        assert_eq!(
            provider().map(|config| config.base_url),
            Some("https://sync.example.com".to_string())
        );
    }
}
