//! Status command handler

use anyhow::Result;
use vplanet_core::{CalendarApi, Config};

use crate::output::Output;

/// Show configuration and probe the API server
pub async fn show(config: &Config, output: &Output) -> Result<()> {
    let push_url = config
        .push_url()
        .map(|u| u.to_string())
        .unwrap_or_else(|_| "<invalid>".to_string());

    if output.is_json() {
        let api = CalendarApi::from_config(config)?;
        let reachable = api.list_events().await.is_ok();
        println!(
            "{}",
            serde_json::json!({
                "api_url": config.api_url,
                "push_url": push_url,
                "reachable": reachable,
            })
        );
        return Ok(());
    }

    println!("API URL:   {}", config.api_url);
    println!("Push URL:  {}", push_url);
    println!(
        "Polling:   {}s fast / {}s slow",
        config.fast_poll_secs, config.slow_poll_secs
    );

    let api = CalendarApi::from_config(config)?;
    match api.list_events().await {
        Ok(events) => output.success(&format!("Server reachable, {} event(s)", events.len())),
        Err(e) => output.message(&format!("Server not reachable: {}", e)),
    }

    Ok(())
}
