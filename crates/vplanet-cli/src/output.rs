//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use vplanet_core::{CalendarEvent, ChangeEvent};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is in JSON mode
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single event with all fields
    pub fn print_event(&self, event: &CalendarEvent) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", event.id);
                println!("Title:       {}", event.title);
                if let Some(ref desc) = event.description {
                    println!("Description: {}", desc);
                }
                println!("Date:        {}", event.date);
                println!("Time:        {}", event.time.format("%H:%M"));
                println!("Created:     {}", event.created_at.format("%Y-%m-%d %H:%M"));
                println!("Updated:     {}", event.updated_at.format("%Y-%m-%d %H:%M"));
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(event).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", event.id);
            }
        }
    }

    /// Print a list of events
    pub fn print_events(&self, events: &[CalendarEvent]) {
        match self.format {
            OutputFormat::Human => {
                if events.is_empty() {
                    println!("No events found.");
                    return;
                }
                for event in events {
                    println!(
                        "{:>6} | {} {} | {}",
                        event.id,
                        event.date,
                        event.time.format("%H:%M"),
                        truncate(&event.title, 50)
                    );
                }
                println!("\n{} event(s)", events.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(events).unwrap());
            }
            OutputFormat::Quiet => {
                for event in events {
                    println!("{}", event.id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Render one change event as a single line (or JSON blob), suitable for
/// printing from inside a sync listener
pub fn format_change(change: &ChangeEvent, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return serde_json::to_string(change).unwrap_or_default();
    }
    match change {
        ChangeEvent::Create { event, occurred_at } => format!(
            "[{}] created #{}: {}",
            occurred_at.format("%H:%M:%S"),
            event.id,
            event.title
        ),
        ChangeEvent::Update { event, occurred_at } => format!(
            "[{}] updated #{}: {}",
            occurred_at.format("%H:%M:%S"),
            event.id,
            event.title
        ),
        ChangeEvent::Delete {
            event_id,
            occurred_at,
        } => format!("[{}] deleted #{}", occurred_at.format("%H:%M:%S"), event_id),
        ChangeEvent::BulkUpdate { events, occurred_at } => format!(
            "[{}] bulk update of {} event(s)",
            occurred_at.format("%H:%M:%S"),
            events.len()
        ),
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    // Back off to a char boundary so the slice never splits a multi-byte
    // character
    let mut cut = max_len.saturating_sub(3);
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
    }

    #[test]
    fn test_truncate_multibyte_title() {
        // Cut point lands mid-character; must not panic
        let title = "é".repeat(60);
        let out = truncate(&title, 50);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 50);
    }

    #[test]
    fn test_format_change_delete() {
        let change = ChangeEvent::Delete {
            event_id: 12,
            occurred_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap(),
        };
        let line = format_change(&change, OutputFormat::Human);
        assert!(line.contains("deleted #12"));
        assert!(line.contains("09:30:00"));
    }

    #[test]
    fn test_format_change_json() {
        let change = ChangeEvent::Delete {
            event_id: 12,
            occurred_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap(),
        };
        let line = format_change(&change, OutputFormat::Json);
        assert!(line.contains(r#""kind":"delete""#));
        assert!(line.contains(r#""eventId":12"#));
    }
}
