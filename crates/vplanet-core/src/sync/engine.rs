//! Realtime calendar sync engine
//!
//! Maintains live consistency with the server over two channels: a
//! WebSocket push channel as the primary transport and HTTP polling as the
//! fallback. The engine activates on the first subscriber and tears down
//! fully when the last one leaves.
//!
//! Transport rules:
//! - While the push channel is open, polling runs at a slow cadence as a
//!   safety net. When push is absent or degraded, polling speeds up.
//! - Push reconnects with exponential backoff, bounded by an attempt
//!   budget. Once spent, the engine stays on polling until re-activation
//!   or an explicit visibility retry.
//! - Both channels are best-effort: the same logical change can arrive
//!   twice, so consumers must apply changes idempotently.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use super::change::{ChangeEvent, UpdatesResponse};
use super::state::{fan_out, EngineState, Listener, PollCadence, PushStatus};
use crate::api::CalendarApi;
use crate::error::ApiResult;
use crate::models::{BatchEntry, CalendarEvent, EventDraft, EventId, EventPatch};

/// Close code sent by the engine's own teardown. Any close observed
/// without having sent this is abnormal and triggers reconnection.
const CLOSE_SHUTDOWN: u16 = 4001;

/// Tunables for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Push channel URL
    pub push_url: Url,
    /// Poll interval while push is absent or degraded
    pub fast_poll: Duration,
    /// Poll interval while push is confirmed open
    pub slow_poll: Duration,
    /// Initial reconnect delay; doubles per attempt
    pub reconnect_base: Duration,
    /// Hard cap on a single reconnect delay
    pub reconnect_max_delay: Duration,
    /// Reconnect attempt budget before settling on poll-only
    pub reconnect_max_attempts: u32,
    /// Delay between a successful mutation and its sync nudge
    pub nudge_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_url: Url::parse("ws://localhost:8000/ws/calendar/").expect("static URL"),
            fast_poll: Duration::from_secs(5),
            slow_poll: Duration::from_secs(30),
            reconnect_base: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            reconnect_max_attempts: 5,
            nudge_delay: Duration::from_millis(100),
        }
    }
}

/// The poll timer task, tagged with its cadence so a cadence change can
/// tell whether a restart is needed
struct PollTask {
    cadence: PollCadence,
    handle: JoinHandle<()>,
}

/// State behind the service's single lock. Critical sections never await
/// and never invoke listeners.
struct Inner {
    state: EngineState,
    poll_task: Option<PollTask>,
    push_task: Option<JoinHandle<()>>,
    push_shutdown: Option<watch::Sender<bool>>,
    reconnect_task: Option<JoinHandle<()>>,
    timers_started: u64,
    timers_cleared: u64,
}

/// Calendar sync service: CRUD operations plus realtime change delivery
/// to subscribed listeners. Cheap to clone; clones share one engine.
#[derive(Clone)]
pub struct CalendarService {
    api: CalendarApi,
    config: Arc<SyncConfig>,
    inner: Arc<Mutex<Inner>>,
}

impl CalendarService {
    pub fn new(config: SyncConfig, api: CalendarApi) -> Self {
        Self {
            api,
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(Inner {
                state: EngineState::new(),
                poll_task: None,
                push_task: None,
                push_shutdown: None,
                reconnect_task: None,
                timers_started: 0,
                timers_cleared: 0,
            })),
        }
    }

    /// Register a change listener. The first subscriber activates the
    /// engine: polling starts and a push connection attempt begins.
    /// Registering the same callback twice is a no-op.
    pub fn subscribe(&self, listener: Listener) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.state.add_listener(listener) {
            return;
        }
        if inner.state.listener_count() == 1 {
            debug!("First subscriber, activating sync engine");
            inner.state.reset_reconnect();
            self.start_poll(&mut inner, PollCadence::Fast);
            self.start_push(&mut inner);
        }
    }

    /// Remove a change listener. When the last one leaves, the engine
    /// stops entirely: timer cleared, push channel closed.
    pub fn unsubscribe(&self, listener: &Listener) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state.remove_listener(listener) && !inner.state.has_listeners() {
            debug!("Last subscriber gone, stopping sync engine");
            Self::teardown(&mut inner);
        }
    }

    /// Full teardown regardless of subscribers: stop the timer, close the
    /// push channel with the shutdown code, drop all listeners. This is
    /// the page-unload path.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock().unwrap();
        Self::teardown(&mut inner);
    }

    /// Page visibility signal. Becoming visible triggers one immediate
    /// update check and, if the push channel is down, a reopen attempt -
    /// allowed even after the reconnect budget is spent.
    pub fn handle_visibility(&self, visible: bool) {
        if !visible {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        if !inner.state.has_listeners() {
            return;
        }
        let service = self.clone();
        let epoch = inner.state.epoch();
        tokio::spawn(async move {
            if service.epoch_current(epoch) {
                service.check_updates().await;
            }
        });
        if inner.state.push() == PushStatus::Absent {
            self.start_push(&mut inner);
        }
    }

    // --- CRUD: REST result is authoritative for the caller; the nudge is
    // --- a best-effort follow-up, never awaited.

    /// Create an event
    pub async fn create_event(&self, draft: &EventDraft) -> ApiResult<CalendarEvent> {
        let event = self.api.create_event(draft).await?;
        self.schedule_nudge();
        Ok(event)
    }

    /// Replace an event's full content
    pub async fn update_event(&self, id: EventId, draft: &EventDraft) -> ApiResult<CalendarEvent> {
        let event = self.api.replace_event(id, draft).await?;
        self.schedule_nudge();
        Ok(event)
    }

    /// Update a subset of an event's fields
    pub async fn patch_event(&self, id: EventId, patch: &EventPatch) -> ApiResult<CalendarEvent> {
        let event = self.api.patch_event(id, patch).await?;
        self.schedule_nudge();
        Ok(event)
    }

    /// Delete an event
    pub async fn delete_event(&self, id: EventId) -> ApiResult<()> {
        self.api.delete_event(id).await?;
        self.schedule_nudge();
        Ok(())
    }

    /// Apply several partial updates in one request
    pub async fn batch_update(&self, entries: &[BatchEntry]) -> ApiResult<Vec<CalendarEvent>> {
        let events = self.api.batch_update(entries).await?;
        self.schedule_nudge();
        Ok(events)
    }

    // --- Reads: pure read-throughs. A successful read is a reasonable
    // --- baseline for subsequent incremental polling.

    /// List all events
    pub async fn fetch_events(&self) -> ApiResult<Vec<CalendarEvent>> {
        let events = self.api.list_events().await?;
        self.mark_baseline();
        Ok(events)
    }

    /// Fetch one event
    pub async fn fetch_event(&self, id: EventId) -> ApiResult<CalendarEvent> {
        let event = self.api.event(id).await?;
        self.mark_baseline();
        Ok(event)
    }

    /// List events on a given day
    pub async fn fetch_events_by_date(&self, date: NaiveDate) -> ApiResult<Vec<CalendarEvent>> {
        let events = self.api.events_by_date(date).await?;
        self.mark_baseline();
        Ok(events)
    }

    /// List events within an inclusive date range
    pub async fn fetch_events_by_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApiResult<Vec<CalendarEvent>> {
        let events = self.api.events_by_range(start, end).await?;
        self.mark_baseline();
        Ok(events)
    }

    // --- Status accessors

    pub fn listener_count(&self) -> usize {
        self.inner.lock().unwrap().state.listener_count()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.lock().unwrap().poll_task.is_some()
    }

    pub fn poll_cadence(&self) -> PollCadence {
        self.inner.lock().unwrap().state.cadence()
    }

    pub fn push_status(&self) -> PushStatus {
        self.inner.lock().unwrap().state.push()
    }

    pub fn last_observed(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().unwrap().state.last_observed()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock().unwrap().state.reconnect_attempts()
    }

    // --- Internals

    fn teardown(inner: &mut Inner) {
        inner.state.bump_epoch();
        inner.state.clear_listeners();
        inner.state.reset_reconnect();
        inner.state.set_push(PushStatus::Absent);
        inner.state.set_cadence(PollCadence::Fast);
        if let Some(poll) = inner.poll_task.take() {
            poll.handle.abort();
            inner.timers_cleared += 1;
        }
        if let Some(tx) = inner.push_shutdown.take() {
            // The transport task sends the sentinel close frame on its
            // way out; the epoch bump already makes it inert.
            let _ = tx.send(true);
        }
        inner.push_task = None;
        if let Some(handle) = inner.reconnect_task.take() {
            handle.abort();
        }
    }

    fn epoch_current(&self, epoch: u64) -> bool {
        self.inner.lock().unwrap().state.epoch() == epoch
    }

    fn mark_baseline(&self) {
        self.inner.lock().unwrap().state.observe(Utc::now());
    }

    /// Best-effort post-mutation sync check. Fires after a short delay to
    /// allow server-side propagation; the regular poll/push path remains
    /// the authority.
    fn schedule_nudge(&self) {
        let epoch = self.inner.lock().unwrap().state.epoch();
        let delay = self.config.nudge_delay;
        let service = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if service.epoch_current(epoch) {
                service.check_updates().await;
            }
        });
    }

    /// One "check for updates" step against the updates endpoint
    async fn check_updates(&self) {
        let since = self.inner.lock().unwrap().state.last_observed();
        match self.api.updates(since).await {
            Ok(response) => self.apply_updates(response),
            // The next scheduled tick retries naturally; polling itself
            // never backs off
            Err(e) => warn!("Update check failed: {}", e),
        }
    }

    /// Advance the watermark, then deliver in server order
    fn apply_updates(&self, response: UpdatesResponse) {
        if response.updates.is_empty() {
            return;
        }
        let listeners = {
            let mut inner = self.inner.lock().unwrap();
            inner.state.observe(response.latest_timestamp);
            inner.state.listeners_snapshot()
        };
        for change in &response.updates {
            fan_out(&listeners, change);
        }
    }

    /// One push-channel message: parse, advance watermark, fan out.
    /// Unparsable messages are dropped.
    fn handle_push_text(&self, epoch: u64, text: &str) {
        let change = match ChangeEvent::decode(text) {
            Ok(change) => change,
            Err(e) => {
                warn!("Dropping unparsable push message: {}", e);
                return;
            }
        };
        let listeners = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state.epoch() != epoch {
                return;
            }
            inner.state.observe(change.occurred_at());
            inner.state.listeners_snapshot()
        };
        fan_out(&listeners, &change);
    }

    /// (Re)start the poll timer at the given cadence. A timer already
    /// running at that cadence is left alone; otherwise the old timer is
    /// cleared first so at most one ever runs.
    fn start_poll(&self, inner: &mut Inner, cadence: PollCadence) {
        if let Some(ref poll) = inner.poll_task {
            if poll.cadence == cadence {
                return;
            }
        }
        if let Some(poll) = inner.poll_task.take() {
            poll.handle.abort();
            inner.timers_cleared += 1;
        }

        inner.state.set_cadence(cadence);
        let interval = match cadence {
            PollCadence::Fast => self.config.fast_poll,
            PollCadence::Slow => self.config.slow_poll,
        };

        let service = self.clone();
        let epoch = inner.state.epoch();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval's first tick completes immediately; the real wait
            // starts here
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !service.epoch_current(epoch) {
                    break;
                }
                service.check_updates().await;
            }
        });
        inner.timers_started += 1;
        inner.poll_task = Some(PollTask { cadence, handle });
    }

    /// Open the push channel unless a connection already exists or is in
    /// flight
    fn start_push(&self, inner: &mut Inner) {
        match inner.state.push() {
            PushStatus::Connecting | PushStatus::Open => return,
            PushStatus::Absent => {}
        }
        inner.state.set_push(PushStatus::Connecting);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let service = self.clone();
        let epoch = inner.state.epoch();
        let handle = tokio::spawn(async move {
            service.run_push(epoch, shutdown_rx).await;
        });
        inner.push_shutdown = Some(shutdown_tx);
        inner.push_task = Some(handle);
    }

    /// One push-channel session: connect, drain messages, report how it
    /// ended. Reconnection is only ever scheduled from the down path, so
    /// close and error cannot race into duplicate attempts.
    async fn run_push(&self, epoch: u64, mut shutdown: watch::Receiver<bool>) {
        let url = self.config.push_url.clone();
        debug!("Opening push channel to {}", url);

        let connected = tokio::select! {
            result = connect_async(url.as_str()) => result,
            _ = shutdown.changed() => return,
        };

        let ws_stream = match connected {
            Ok((stream, _response)) => stream,
            Err(e) => {
                warn!("Push channel failed to open: {}", e);
                self.on_push_down(epoch);
                return;
            }
        };

        if !self.on_push_open(epoch) {
            // Torn down while the connect was in flight
            return;
        }

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    let frame = CloseFrame {
                        code: CloseCode::Library(CLOSE_SHUTDOWN),
                        reason: "client shutdown".into(),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    return;
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_push_text(epoch, &text),
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Push channel closed by server: {:?}", frame);
                        self.on_push_down(epoch);
                        return;
                    }
                    Some(Ok(_)) => {} // ping/pong/binary: nothing to do
                    Some(Err(e)) => {
                        warn!("Push channel error: {}", e);
                        self.on_push_down(epoch);
                        return;
                    }
                    None => {
                        self.on_push_down(epoch);
                        return;
                    }
                }
            }
        }
    }

    /// Push confirmed open: reset backoff, relax polling to the slow
    /// cadence. Returns false if the engine was torn down meanwhile.
    fn on_push_open(&self, epoch: u64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.state.epoch() != epoch {
            return false;
        }
        info!("Push channel open, relaxing poll cadence");
        inner.state.set_push(PushStatus::Open);
        inner.state.reset_reconnect();
        self.start_poll(&mut inner, PollCadence::Slow);
        true
    }

    /// Push went down abnormally (failed open, server close, transport
    /// error): polling becomes primary again, and a reconnect is
    /// scheduled while subscribers remain.
    fn on_push_down(&self, epoch: u64) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state.epoch() != epoch {
            return;
        }
        inner.state.set_push(PushStatus::Absent);
        inner.push_task = None;
        inner.push_shutdown = None;
        self.start_poll(&mut inner, PollCadence::Fast);
        if inner.state.has_listeners() {
            self.schedule_reconnect(&mut inner);
        }
    }

    fn schedule_reconnect(&self, inner: &mut Inner) {
        let delay = match inner.state.next_reconnect_delay(
            self.config.reconnect_base,
            self.config.reconnect_max_delay,
            self.config.reconnect_max_attempts,
        ) {
            Some(delay) => delay,
            None => {
                warn!(
                    "Push reconnect budget exhausted after {} attempts; staying on polling",
                    self.config.reconnect_max_attempts
                );
                return;
            }
        };
        debug!(
            "Scheduling push reconnect attempt {} in {:?}",
            inner.state.reconnect_attempts(),
            delay
        );

        let service = self.clone();
        let epoch = inner.state.epoch();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut inner = service.inner.lock().unwrap();
            if inner.state.epoch() != epoch || !inner.state.has_listeners() {
                return;
            }
            if inner.state.push() == PushStatus::Absent {
                service.start_push(&mut inner);
            }
        });
        inner.reconnect_task = Some(handle);
    }
}
