use std::env;

use linkora_core::util::{is_http_url, normalize_text_option};
use linkora_core::ServerConfig;

use crate::cli::ConfigCommands;
use crate::config_profiles::{CliProfilesConfig, AUTH_TOKEN_ENV};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            server_url,
            token,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            server_url,
            token,
            no_activate,
        ),
        ConfigCommands::Show => run_config_show(global_profile),
    }
}

#[allow(clippy::needless_pass_by_value)]
pub fn run_config_init(
    profile_name: Option<&str>,
    server_url: String,
    token: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_token = config
        .profile(&profile_name)
        .and_then(|profile| profile.auth_token());

    let server_url = normalize_server_url(server_url)?;
    let auth_token = normalize_text_option(token)
        .or_else(|| normalize_text_option(env::var(AUTH_TOKEN_ENV).ok()))
        .or(existing_token);
    if let Some(token) = auth_token.as_deref() {
        ServerConfig::new(server_url.as_str(), token)?;
    }

    let profile = config.profile_mut_or_default(&profile_name);
    profile.server_url = Some(server_url);
    if let Some(token) = auth_token {
        profile.auth_token = Some(token);
    }

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let ready = config
        .profile(&profile_name)
        .is_some_and(|profile| profile.auth_token().is_some());
    if ready {
        println!("Profile '{profile_name}' is ready. Run `linkora sync`.");
    } else {
        println!("Profile '{profile_name}' is missing: auth_token");
    }
    Ok(())
}

pub fn normalize_server_url(url: String) -> Result<String, CliError> {
    let normalized = normalize_text_option(Some(url))
        .ok_or_else(|| CliError::Config("server_url must not be empty".to_string()))?;
    if !is_http_url(&normalized) {
        return Err(CliError::Config(
            "server_url must include http:// or https://".to_string(),
        ));
    }
    Ok(normalized.trim_end_matches('/').to_string())
}

fn run_config_show(global_profile: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    if config.profiles.is_empty() {
        println!("No profiles configured.");
        return Ok(());
    }

    let selected = config.resolve_profile_name(global_profile);
    for (name, profile) in &config.profiles {
        let marker = if *name == selected { "*" } else { " " };
        let server = profile.server_url().unwrap_or_else(|| "-".to_string());
        let token = if profile.auth_token().is_some() {
            "set"
        } else {
            "missing"
        };
        println!("{marker} {name}: {server} (token {token})");
    }
    Ok(())
}
