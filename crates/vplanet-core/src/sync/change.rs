//! Sync notification types
//!
//! One `ChangeEvent` describes one observed server-side mutation. The same
//! JSON shape arrives over both channels: the push channel delivers one
//! event per WebSocket text message, the updates endpoint delivers a batch.
//!
//! Events are transient: consumed once by each registered listener, never
//! persisted. Duplicates can arrive via both channels for the same
//! underlying server change, so consumers must treat application of a
//! change as idempotent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CalendarEvent, EventId};

/// A server-side calendar mutation, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// An event was created
    Create {
        event: CalendarEvent,
        #[serde(rename = "occurredAt")]
        occurred_at: DateTime<Utc>,
    },
    /// An event's content changed
    Update {
        event: CalendarEvent,
        #[serde(rename = "occurredAt")]
        occurred_at: DateTime<Utc>,
    },
    /// An event was destroyed
    Delete {
        #[serde(rename = "eventId")]
        event_id: EventId,
        #[serde(rename = "occurredAt")]
        occurred_at: DateTime<Utc>,
    },
    /// Several events changed in one server-side operation
    BulkUpdate {
        events: Vec<CalendarEvent>,
        #[serde(rename = "occurredAt")]
        occurred_at: DateTime<Utc>,
    },
}

impl ChangeEvent {
    /// When the server observed this mutation
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ChangeEvent::Create { occurred_at, .. }
            | ChangeEvent::Update { occurred_at, .. }
            | ChangeEvent::Delete { occurred_at, .. }
            | ChangeEvent::BulkUpdate { occurred_at, .. } => *occurred_at,
        }
    }

    /// Decode one push-channel message
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Response of `GET /api/calendar/updates/`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdatesResponse {
    /// Changes since the requested watermark, in server order
    pub updates: Vec<ChangeEvent>,
    /// Watermark to use for the next incremental request
    pub latest_timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_event_json() -> &'static str {
        r#"{
            "id": 1,
            "title": "Changed",
            "date": "2025-06-01",
            "time": "12:00:00",
            "created_at": "2025-05-30T09:00:00Z",
            "updated_at": "2025-06-01T08:00:00Z"
        }"#
    }

    #[test]
    fn test_decode_update() {
        let json = format!(
            r#"{{"kind":"update","event":{},"occurredAt":"2025-06-01T08:00:00Z"}}"#,
            sample_event_json()
        );
        let change = ChangeEvent::decode(&json).unwrap();
        match change {
            ChangeEvent::Update { event, occurred_at } => {
                assert_eq!(event.id, 1);
                assert_eq!(event.title, "Changed");
                assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
                assert_eq!(occurred_at.to_rfc3339(), "2025-06-01T08:00:00+00:00");
            }
            other => panic!("Expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_delete() {
        let json = r#"{"kind":"delete","eventId":42,"occurredAt":"2025-06-01T08:00:00Z"}"#;
        let change = ChangeEvent::decode(json).unwrap();
        match change {
            ChangeEvent::Delete { event_id, .. } => assert_eq!(event_id, 42),
            other => panic!("Expected delete, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_bulk_update() {
        let json = format!(
            r#"{{"kind":"bulk_update","events":[{},{}],"occurredAt":"2025-06-01T08:00:00Z"}}"#,
            sample_event_json(),
            sample_event_json()
        );
        let change = ChangeEvent::decode(&json).unwrap();
        match change {
            ChangeEvent::BulkUpdate { events, .. } => assert_eq!(events.len(), 2),
            other => panic!("Expected bulk_update, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_kind_fails() {
        let json = r#"{"kind":"truncate","occurredAt":"2025-06-01T08:00:00Z"}"#;
        assert!(ChangeEvent::decode(json).is_err());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(ChangeEvent::decode("not json at all").is_err());
        assert!(ChangeEvent::decode("{}").is_err());
    }

    #[test]
    fn test_updates_response_order_preserved() {
        let json = format!(
            r#"{{
                "updates": [
                    {{"kind":"delete","eventId":3,"occurredAt":"2025-06-01T08:00:00Z"}},
                    {{"kind":"create","event":{},"occurredAt":"2025-06-01T08:00:01Z"}}
                ],
                "latest_timestamp": "2025-06-01T08:00:01Z"
            }}"#,
            sample_event_json()
        );
        let response: UpdatesResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(response.updates.len(), 2);
        // Server order is authoritative: delete first, then create
        assert!(matches!(response.updates[0], ChangeEvent::Delete { .. }));
        assert!(matches!(response.updates[1], ChangeEvent::Create { .. }));
        assert_eq!(
            response.latest_timestamp,
            response.updates[1].occurred_at()
        );
    }
}
