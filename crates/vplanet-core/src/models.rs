//! Data models for VideoPlanet calendar events
//!
//! Calendar events are server-owned records: the server assigns identifiers
//! and maintains the creation/modification timestamps. Clients only ever
//! submit drafts (full payloads) or patches (partial payloads).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned event identifier. Opaque to the client.
pub type EventId = i64;

/// A calendar event as returned by the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    /// Unique identifier (server-assigned, immutable)
    pub id: EventId,
    /// Event title
    pub title: String,
    /// Optional longer description
    #[serde(default)]
    pub description: Option<String>,
    /// Calendar day the event falls on
    pub date: NaiveDate,
    /// Time of day
    pub time: NaiveTime,
    /// When this event was created
    pub created_at: DateTime<Utc>,
    /// When this event was last modified
    pub updated_at: DateTime<Utc>,
}

/// Full event payload for create (POST) and replace (PUT)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl EventDraft {
    /// Create a draft with the given title on the given day
    pub fn new(title: impl Into<String>, date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            title: title.into(),
            description: None,
            date,
            time,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial event payload for PATCH. Omitted fields are left untouched
/// by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
}

impl EventPatch {
    /// True if no field is set
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.time.is_none()
    }
}

/// One entry of a batch-update request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchEntry {
    pub id: EventId,
    pub data: EventPatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "id": 7,
            "title": "Review session",
            "description": "Cut 3 walkthrough",
            "date": "2025-06-01",
            "time": "14:30:00",
            "created_at": "2025-05-30T09:00:00Z",
            "updated_at": "2025-05-30T10:15:00Z"
        }"#
    }

    #[test]
    fn test_event_deserialization() {
        let event: CalendarEvent = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(event.id, 7);
        assert_eq!(event.title, "Review session");
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(event.time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
    }

    #[test]
    fn test_event_missing_description() {
        let json = r#"{
            "id": 8,
            "title": "Untitled",
            "date": "2025-06-02",
            "time": "09:00:00",
            "created_at": "2025-05-30T09:00:00Z",
            "updated_at": "2025-05-30T09:00:00Z"
        }"#;
        let event: CalendarEvent = serde_json::from_str(json).unwrap();
        assert!(event.description.is_none());
    }

    #[test]
    fn test_patch_skips_unset_fields() {
        let patch = EventPatch {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"title":"Renamed"}"#);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(EventPatch::default().is_empty());
        let patch = EventPatch {
            date: NaiveDate::from_ymd_opt(2025, 6, 3),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_draft_builder() {
        let draft = EventDraft::new(
            "Kickoff",
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        )
        .with_description("First review round");

        assert_eq!(draft.title, "Kickoff");
        assert_eq!(draft.description.as_deref(), Some("First review round"));
    }
}
