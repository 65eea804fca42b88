use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::DateTime;
use linkora_core::config::fixed_connection;
use linkora_core::{HttpTransport, LocalStore, ServerConfig, SyncEngine};

use crate::config_profiles::{CliProfile, CliProfilesConfig, AUTH_TOKEN_ENV, SERVER_URL_ENV};
use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("LINKORA_DB_PATH").map(PathBuf::from))
    {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("linkora").join("linkora.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub async fn open_store(db_path: &Path) -> Result<LocalStore, CliError> {
    Ok(LocalStore::open_path(db_path).await?)
}

/// Server for the selected profile, with `LINKORA_SERVER_URL` and
/// `LINKORA_AUTH_TOKEN` taking precedence over stored values.
pub fn server_config_for_profile(profile: Option<&str>) -> Result<ServerConfig, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let resolved = resolve_server_config(
        config.profile(&profile_name),
        env::var(SERVER_URL_ENV).ok(),
        env::var(AUTH_TOKEN_ENV).ok(),
    )?;
    tracing::info!("Using server profile '{profile_name}'");
    Ok(resolved)
}

pub fn resolve_server_config(
    profile: Option<&CliProfile>,
    env_server_url: Option<String>,
    env_auth_token: Option<String>,
) -> Result<ServerConfig, CliError> {
    let server_url = linkora_core::util::normalize_text_option(env_server_url)
        .or_else(|| profile.and_then(CliProfile::server_url))
        .ok_or(CliError::ServerNotConfigured)?;
    let auth_token = linkora_core::util::normalize_text_option(env_auth_token)
        .or_else(|| profile.and_then(CliProfile::auth_token))
        .ok_or(CliError::ServerNotConfigured)?;
    Ok(ServerConfig::new(server_url, auth_token)?)
}

pub async fn build_engine(
    db_path: &Path,
    profile: Option<&str>,
) -> Result<SyncEngine<HttpTransport>, CliError> {
    let server = server_config_for_profile(profile)?;
    let store = open_store(db_path).await?;
    let transport = HttpTransport::new(fixed_connection(server))?;
    Ok(SyncEngine::new(store, Arc::new(transport)))
}

/// Human-readable form of a watermark.
pub fn format_sync_timestamp(timestamp: i64) -> String {
    if timestamp <= 0 {
        return "never".to_string();
    }
    DateTime::from_timestamp(timestamp, 0)
        .map_or_else(|| timestamp.to_string(), |time| time.to_rfc3339())
}
