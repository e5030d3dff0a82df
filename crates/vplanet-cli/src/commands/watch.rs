//! Watch command handler
//!
//! Subscribes to the sync engine and prints change events as they arrive,
//! until interrupted. Ctrl-C runs the full teardown path, so no timer or
//! socket outlives the process's useful life.

use std::sync::Arc;

use anyhow::Result;
use vplanet_core::{CalendarService, ChangeEvent, Listener};

use crate::output::{format_change, Output};

/// Watch for calendar changes and print them live
pub async fn watch(service: &CalendarService, output: &Output) -> Result<()> {
    let format = output.format;
    let listener: Listener = Arc::new(move |change: &ChangeEvent| {
        println!("{}", format_change(change, format));
    });

    service.subscribe(listener.clone());
    output.message("Watching for calendar changes. Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;

    service.unsubscribe(&listener);
    service.shutdown();
    output.message("Stopped.");
    Ok(())
}
