//! Realtime calendar synchronization
//!
//! Keeps subscribers consistent with the server over two channels:
//!
//! 1. A WebSocket push channel at `/ws/calendar/` (primary): the server
//!    pushes one JSON [`ChangeEvent`] per message.
//! 2. HTTP polling of `/api/calendar/updates/` (fallback): incremental
//!    batches keyed by a `since` watermark.
//!
//! Ordering is only guaranteed within a single poll batch (server order).
//! Across channels delivery is best-effort and may duplicate, so
//! consumers apply changes idempotently.
//!
//! ## Usage
//!
//! ```ignore
//! let service = CalendarService::new(config.sync_config()?, api);
//! let listener: Listener = Arc::new(|change| println!("{:?}", change));
//! service.subscribe(listener.clone());
//! // ... later
//! service.unsubscribe(&listener);
//! ```

mod change;
mod engine;
mod state;

pub use change::{ChangeEvent, UpdatesResponse};
pub use engine::{CalendarService, SyncConfig};
pub use state::{Listener, PollCadence, PushStatus};
