//! Event command handlers

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use std::path::PathBuf;

use vplanet_core::{BatchEntry, CalendarService, EventDraft, EventId, EventPatch};

use crate::output::Output;

/// List events, optionally filtered by day or range
pub async fn list(
    service: &CalendarService,
    date: Option<NaiveDate>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    output: &Output,
) -> Result<()> {
    let events = match (date, from, to) {
        (Some(date), _, _) => service.fetch_events_by_date(date).await?,
        (None, Some(from), Some(to)) => service.fetch_events_by_range(from, to).await?,
        (None, None, None) => service.fetch_events().await?,
        _ => anyhow::bail!("--from and --to must be given together"),
    };
    output.print_events(&events);
    Ok(())
}

/// Show one event
pub async fn show(service: &CalendarService, id: EventId, output: &Output) -> Result<()> {
    let event = service.fetch_event(id).await?;
    output.print_event(&event);
    Ok(())
}

/// Create an event
pub async fn create(
    service: &CalendarService,
    title: String,
    date: NaiveDate,
    time: NaiveTime,
    description: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut draft = EventDraft::new(title, date, time);
    draft.description = description;

    let event = service.create_event(&draft).await?;
    output.success(&format!("Created event #{}", event.id));
    output.print_event(&event);
    Ok(())
}

/// Partially update an event (PATCH)
#[allow(clippy::too_many_arguments)]
pub async fn edit(
    service: &CalendarService,
    id: EventId,
    title: Option<String>,
    description: Option<String>,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    output: &Output,
) -> Result<()> {
    let patch = EventPatch {
        title,
        description,
        date,
        time,
    };
    if patch.is_empty() {
        anyhow::bail!("Nothing to change. Pass at least one of --title/--description/--date/--time.");
    }

    let event = service.patch_event(id, &patch).await?;
    output.success(&format!("Updated event #{}", event.id));
    output.print_event(&event);
    Ok(())
}

/// Replace an event's full content (PUT)
pub async fn replace(
    service: &CalendarService,
    id: EventId,
    title: String,
    date: NaiveDate,
    time: NaiveTime,
    description: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut draft = EventDraft::new(title, date, time);
    draft.description = description;

    let event = service.update_event(id, &draft).await?;
    output.success(&format!("Replaced event #{}", event.id));
    output.print_event(&event);
    Ok(())
}

/// Delete an event
pub async fn delete(service: &CalendarService, id: EventId, output: &Output) -> Result<()> {
    service.delete_event(id).await?;
    output.success(&format!("Deleted event #{}", id));
    Ok(())
}

/// Apply a batch of partial updates from a JSON file of
/// `[{"id": ..., "data": {...}}, ...]`
pub async fn batch(service: &CalendarService, file: PathBuf, output: &Output) -> Result<()> {
    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read batch file: {:?}", file))?;
    let entries: Vec<BatchEntry> =
        serde_json::from_str(&content).context("Batch file is not a valid update list")?;

    if entries.is_empty() {
        anyhow::bail!("Batch file contains no updates");
    }

    let events = service.batch_update(&entries).await?;
    output.success(&format!("Updated {} event(s)", events.len()));
    output.print_events(&events);
    Ok(())
}
