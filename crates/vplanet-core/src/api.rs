//! Calendar REST client
//!
//! Thin wrapper over the VideoPlanet calendar resource. Every response
//! arrives in the generic envelope `{success, data}` or
//! `{success: false, error}`; this client unwraps the envelope and maps
//! the failure shape to [`ApiError`].
//!
//! Pure network failures (connect, timeout) are retried once. Anything the
//! server actually said - including `success: false` - is returned to the
//! caller unmodified; retry decisions above that belong to the caller.

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{ApiError, ApiResult};
use crate::models::{BatchEntry, CalendarEvent, EventDraft, EventId, EventPatch};
use crate::sync::UpdatesResponse;

/// Generic response envelope. Missing `data`/`error` fields decode to
/// `None` without imposing bounds beyond `T: Deserialize`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<ErrorBody>,
}

/// Error half of the envelope
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    code: String,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

/// Client for the calendar REST resource
#[derive(Debug, Clone)]
pub struct CalendarApi {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl CalendarApi {
    /// Create a client against the given API base URL
    pub fn new(base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
            token: None,
        }
    }

    /// Attach a bearer token to every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Build a client from application configuration
    pub fn from_config(config: &crate::Config) -> ApiResult<Self> {
        let base = Url::parse(&config.api_url)?;
        let mut api = Self::new(base);
        if let Some(ref token) = config.auth_token {
            api = api.with_token(token.clone());
        }
        Ok(api)
    }

    /// List all calendar events
    pub async fn list_events(&self) -> ApiResult<Vec<CalendarEvent>> {
        self.send(self.http.get(self.endpoint("/api/calendar/")?))
            .await
    }

    /// Fetch one event
    pub async fn event(&self, id: EventId) -> ApiResult<CalendarEvent> {
        self.send(self.http.get(self.event_endpoint(id)?)).await
    }

    /// List events on a given day
    pub async fn events_by_date(&self, date: NaiveDate) -> ApiResult<Vec<CalendarEvent>> {
        let req = self
            .http
            .get(self.endpoint("/api/calendar/")?)
            .query(&[("date", date.to_string())]);
        self.send(req).await
    }

    /// List events within an inclusive date range
    pub async fn events_by_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApiResult<Vec<CalendarEvent>> {
        let req = self
            .http
            .get(self.endpoint("/api/calendar/")?)
            .query(&[("start_date", start.to_string()), ("end_date", end.to_string())]);
        self.send(req).await
    }

    /// Create an event
    pub async fn create_event(&self, draft: &EventDraft) -> ApiResult<CalendarEvent> {
        let req = self.http.post(self.endpoint("/api/calendar/")?).json(draft);
        self.send(req).await
    }

    /// Replace an event's full content (PUT)
    pub async fn replace_event(
        &self,
        id: EventId,
        draft: &EventDraft,
    ) -> ApiResult<CalendarEvent> {
        let req = self.http.put(self.event_endpoint(id)?).json(draft);
        self.send(req).await
    }

    /// Update a subset of an event's fields (PATCH)
    pub async fn patch_event(&self, id: EventId, patch: &EventPatch) -> ApiResult<CalendarEvent> {
        let req = self.http.patch(self.event_endpoint(id)?).json(patch);
        self.send(req).await
    }

    /// Delete an event
    pub async fn delete_event(&self, id: EventId) -> ApiResult<()> {
        let req = self.http.delete(self.event_endpoint(id)?);
        // Delete returns an empty data field; only the envelope matters
        let _: Option<serde_json::Value> = self.send_optional(req).await?;
        Ok(())
    }

    /// Apply several partial updates in one request
    pub async fn batch_update(&self, entries: &[BatchEntry]) -> ApiResult<Vec<CalendarEvent>> {
        let req = self
            .http
            .post(self.endpoint("/api/calendar/batch-update/")?)
            .json(&serde_json::json!({ "updates": entries }));
        self.send(req).await
    }

    /// Poll for changes since the given watermark. `None` asks the server
    /// for its current baseline.
    pub async fn updates(&self, since: Option<DateTime<Utc>>) -> ApiResult<UpdatesResponse> {
        let mut req = self.http.get(self.endpoint("/api/calendar/updates/")?);
        if let Some(since) = since {
            req = req.query(&[("since", since.to_rfc3339())]);
        }
        self.send(req).await
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base.join(path)?)
    }

    fn event_endpoint(&self, id: EventId) -> ApiResult<Url> {
        self.endpoint(&format!("/api/calendar/{}/", id))
    }

    /// Send a request and unwrap the envelope, retrying once on a pure
    /// network failure.
    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> ApiResult<T> {
        match self.send_optional(req).await? {
            Some(data) => Ok(data),
            None => Err(ApiError::MissingData),
        }
    }

    /// Like [`send`](Self::send), but tolerates a missing data field
    async fn send_optional<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> ApiResult<Option<T>> {
        let retry = req.try_clone();
        match self.dispatch(req).await {
            Err(e) if e.is_network() => {
                debug!("Network failure, retrying once: {}", e);
                match retry {
                    Some(req) => self.dispatch(req).await,
                    None => Err(e),
                }
            }
            other => other,
        }
    }

    async fn dispatch<T: DeserializeOwned>(&self, mut req: RequestBuilder) -> ApiResult<Option<T>> {
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }

        let response = req.send().await?;
        let body = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&body)?;

        if envelope.success {
            Ok(envelope.data)
        } else {
            let error = envelope.error.unwrap_or(ErrorBody {
                message: "Server reported failure without detail".to_string(),
                code: "unknown".to_string(),
                details: None,
            });
            Err(ApiError::Api {
                message: error.message,
                code: error.code,
                details: error.details,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn event_body(id: i64, title: &str) -> String {
        format!(
            r#"{{
                "id": {id},
                "title": "{title}",
                "date": "2025-06-01",
                "time": "10:00:00",
                "created_at": "2025-05-30T09:00:00Z",
                "updated_at": "2025-05-30T09:00:00Z"
            }}"#
        )
    }

    fn api_for(server: &mockito::Server) -> CalendarApi {
        CalendarApi::new(Url::parse(&server.url()).unwrap())
    }

    #[tokio::test]
    async fn test_list_events() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/calendar/")
            .with_body(format!(
                r#"{{"success": true, "data": [{}]}}"#,
                event_body(1, "Kickoff")
            ))
            .create_async()
            .await;

        let events = api_for(&server).list_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Kickoff");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/calendar/9/")
            .with_body(
                r#"{"success": false, "error": {"message": "No such event", "code": "not_found"}}"#,
            )
            .create_async()
            .await;

        let err = api_for(&server).event(9).await.unwrap_err();
        match err {
            ApiError::Api { code, message, .. } => {
                assert_eq!(code, "not_found");
                assert_eq!(message, "No such event");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_empty_data() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/calendar/4/")
            .with_body(r#"{"success": true}"#)
            .create_async()
            .await;

        api_for(&server).delete_event(4).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_updates_with_since() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/calendar/updates/")
            .match_query(Matcher::UrlEncoded(
                "since".into(),
                "2025-06-01T08:00:00+00:00".into(),
            ))
            .with_body(
                r#"{"success": true, "data": {"updates": [], "latest_timestamp": "2025-06-01T08:00:00Z"}}"#,
            )
            .create_async()
            .await;

        let since = "2025-06-01T08:00:00Z".parse().unwrap();
        let response = api_for(&server).updates(Some(since)).await.unwrap();
        assert!(response.updates.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_updates_without_since() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/calendar/updates/")
            .match_query(Matcher::Exact(String::new()))
            .with_body(format!(
                r#"{{"success": true, "data": {{
                    "updates": [{{"kind":"create","event":{},"occurredAt":"2025-06-01T08:00:00Z"}}],
                    "latest_timestamp": "2025-06-01T08:00:00Z"
                }}}}"#,
                event_body(2, "Baseline")
            ))
            .create_async()
            .await;

        let response = api_for(&server).updates(None).await.unwrap();
        assert_eq!(response.updates.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_batch_update_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/calendar/batch-update/")
            .match_body(Matcher::Json(serde_json::json!({
                "updates": [{"id": 1, "data": {"title": "Renamed"}}]
            })))
            .with_body(format!(
                r#"{{"success": true, "data": [{}]}}"#,
                event_body(1, "Renamed")
            ))
            .create_async()
            .await;

        let entries = vec![BatchEntry {
            id: 1,
            data: EventPatch {
                title: Some("Renamed".to_string()),
                ..Default::default()
            },
        }];
        let events = api_for(&server).batch_update(&entries).await.unwrap();
        assert_eq!(events[0].title, "Renamed");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bearer_token_attached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/calendar/")
            .match_header("authorization", "Bearer secret-token")
            .with_body(r#"{"success": true, "data": []}"#)
            .create_async()
            .await;

        let api = api_for(&server).with_token("secret-token");
        api.list_events().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_success_without_data_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/calendar/")
            .with_body(r#"{"success": true}"#)
            .create_async()
            .await;

        let err = api_for(&server).list_events().await.unwrap_err();
        assert!(matches!(err, ApiError::MissingData));
    }
}
