//! VideoPlanet Core Library
//!
//! Client-side core for VideoPlanet's collaborative calendar: a REST
//! client for the calendar resource and a realtime sync engine that keeps
//! subscribers consistent with the server.
//!
//! # Architecture
//!
//! - **Push channel**: WebSocket at `/ws/calendar/`, primary transport
//! - **Polling**: incremental `/api/calendar/updates/` requests, fallback
//!   transport and safety net
//!
//! The engine activates lazily on the first subscriber and tears down on
//! the last; CRUD operations nudge a sync check after each mutation.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let api = CalendarApi::from_config(&config)?;
//! let service = CalendarService::new(config.sync_config()?, api);
//!
//! let listener: Listener = Arc::new(|change| handle(change));
//! service.subscribe(listener.clone());
//! ```
//!
//! # Modules
//!
//! - `api`: calendar REST client (envelope handling, retry on network failure)
//! - `models`: calendar event data structures
//! - `sync`: the realtime sync engine (main entry point)
//! - `config`: application configuration
//! - `error`: typed API errors

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod sync;

pub use api::CalendarApi;
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use models::{BatchEntry, CalendarEvent, EventDraft, EventId, EventPatch};
pub use sync::{CalendarService, ChangeEvent, Listener, SyncConfig};
