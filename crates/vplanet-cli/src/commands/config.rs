//! Config command handlers

use anyhow::{bail, Result};
use vplanet_core::Config;

use crate::output::Output;

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load()?;

    if output.is_json() {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("{}", toml::to_string_pretty(&config)?);
    }
    Ok(())
}

/// Set a configuration value and save it
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load()?;

    match key.as_str() {
        "api_url" => config.api_url = value.clone(),
        "ws_url" => {
            config.ws_url = if value.is_empty() { None } else { Some(value.clone()) }
        }
        "auth_token" => {
            config.auth_token = if value.is_empty() { None } else { Some(value.clone()) }
        }
        "fast_poll_secs" => config.fast_poll_secs = value.parse()?,
        "slow_poll_secs" => config.slow_poll_secs = value.parse()?,
        "reconnect_base_ms" => config.reconnect_base_ms = value.parse()?,
        "reconnect_max_attempts" => config.reconnect_max_attempts = value.parse()?,
        "nudge_delay_ms" => config.nudge_delay_ms = value.parse()?,
        _ => bail!(
            "Unknown config key: {}. Valid keys: api_url, ws_url, auth_token, \
             fast_poll_secs, slow_poll_secs, reconnect_base_ms, \
             reconnect_max_attempts, nudge_delay_ms",
            key
        ),
    }

    config.save()?;
    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}
