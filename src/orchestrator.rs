//! Page orchestrator.
//!
//! Owns the application state and drives the fetch → normalize → render
//! pipeline. A single run loop is the only writer of `AppState`; fetches run
//! as spawned tasks and report back through a channel, so they interleave
//! but never mutate state concurrently.
//!
//! Every fetch carries a ticket taken at issue time. When the result lands,
//! it is dropped if a newer request of the same kind was issued since or the
//! selected day moved on, so a slow answer for an old day can never
//! overwrite the map for the current one.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::QuakeSource;
use crate::config::{InitialDate, PipelineConfig};
use crate::date::{api_format, date_label, native_value, parse_day_or, today};
use crate::errors::QuakeError;
use crate::models::{EventRecord, StatusSnapshot};
use crate::render::{Marker, MarkerLayer};
use crate::status::describe;

/// Commands buffered between the surfaces and the run loop.
const COMMAND_BUFFER: usize = 32;

/// Shown until the first status fetch resolves.
const STATUS_LOADING: &str = "Cargando estado…";

/// Lifecycle of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Initial day and status fetches still outstanding.
    Initializing,
    /// Both initial fetches settled; reacting to triggers.
    Ready,
}

/// User-driven triggers.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// New value from the date control (native value or free text).
    SelectDate(String),
    /// Move the selection by a number of days.
    StepDay(i64),
    /// Re-fetch status, and map data when viewing today.
    Refresh,
    /// Map zoom changed; radii only.
    Zoom(f64),
}

/// Identity of an issued day request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTicket {
    seq: u64,
    date: NaiveDate,
}

/// Identity of an issued status request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTicket {
    seq: u64,
}

/// What happened to a day result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOutcome {
    /// Superseded by a newer request; ignored.
    Stale,
    /// Markers replaced; number drawn.
    Rendered(usize),
    /// Failed for the day already on screen; markers left as they were.
    KeptPrevious,
    /// Failed for a day not on screen; layer cleared.
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StatusState {
    Pending,
    Loaded(StatusSnapshot),
    Unavailable,
}

/// Everything the page shows, owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct AppState {
    phase: Phase,
    selected: NaiveDate,
    zoom: f64,
    markers: MarkerLayer,
    status: StatusState,
    /// Day whose data the layer currently shows.
    drawn_date: Option<NaiveDate>,
    day_seq: u64,
    status_seq: u64,
    day_in_flight: bool,
    day_settled: bool,
    status_settled: bool,
    map_updated_at: Option<DateTime<Utc>>,
}

impl AppState {
    #[must_use]
    pub fn new(selected: NaiveDate, zoom: f64) -> Self {
        Self {
            phase: Phase::Initializing,
            selected,
            zoom,
            markers: MarkerLayer::new(),
            status: StatusState::Pending,
            drawn_date: None,
            day_seq: 0,
            status_seq: 0,
            day_in_flight: false,
            day_settled: false,
            status_settled: false,
            map_updated_at: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn markers(&self) -> &MarkerLayer {
        &self.markers
    }

    /// Change the selected day.
    pub fn select(&mut self, date: NaiveDate) {
        if date != self.selected {
            debug!("selected {} (was {})", api_format(date), api_format(self.selected));
        }
        self.selected = date;
    }

    /// Take a ticket for a day request on the selected day.
    pub fn issue_day(&mut self) -> DayTicket {
        self.day_seq += 1;
        self.day_in_flight = true;
        DayTicket {
            seq: self.day_seq,
            date: self.selected,
        }
    }

    /// Take a ticket for a status request.
    pub fn issue_status(&mut self) -> StatusTicket {
        self.status_seq += 1;
        StatusTicket {
            seq: self.status_seq,
        }
    }

    fn is_latest_day(&self, ticket: DayTicket) -> bool {
        ticket.seq == self.day_seq && ticket.date == self.selected
    }

    /// Apply a day result, unless a newer request superseded it.
    pub fn accept_day(
        &mut self,
        ticket: DayTicket,
        result: Result<Vec<EventRecord>, QuakeError>,
        now: DateTime<Utc>,
    ) -> DayOutcome {
        self.day_settled = true;
        self.advance_phase();

        if !self.is_latest_day(ticket) {
            debug!(
                "dropping stale day result #{} for {}",
                ticket.seq,
                api_format(ticket.date)
            );
            return DayOutcome::Stale;
        }
        self.day_in_flight = false;

        match result {
            Ok(records) => {
                let drawn = self.markers.render(&records, Some(self.zoom));
                self.drawn_date = Some(ticket.date);
                self.map_updated_at = Some(now);
                info!(
                    "drew {} of {} events for {}",
                    drawn,
                    records.len(),
                    api_format(ticket.date)
                );
                DayOutcome::Rendered(drawn)
            }
            Err(e) => {
                warn!("day query for {} failed: {}", api_format(ticket.date), e);
                if self.drawn_date == Some(ticket.date) {
                    DayOutcome::KeptPrevious
                } else {
                    self.markers.clear();
                    self.drawn_date = Some(ticket.date);
                    DayOutcome::Cleared
                }
            }
        }
    }

    /// Apply a status result, unless a newer request superseded it. Returns
    /// whether it was applied.
    pub fn accept_status(
        &mut self,
        ticket: StatusTicket,
        result: Result<StatusSnapshot, QuakeError>,
    ) -> bool {
        self.status_settled = true;
        self.advance_phase();

        if ticket.seq != self.status_seq {
            debug!("dropping stale status result #{}", ticket.seq);
            return false;
        }

        self.status = match result {
            Ok(snapshot) => StatusState::Loaded(snapshot),
            Err(e) => {
                warn!("status query failed: {}", e);
                StatusState::Unavailable
            }
        };
        true
    }

    /// New zoom level: radii are recomputed, nothing is refetched.
    pub fn set_zoom(&mut self, zoom: f64) {
        if !zoom.is_finite() {
            warn!("ignoring non-finite zoom {}", zoom);
            return;
        }
        self.zoom = zoom;
        self.markers.rescale(Some(zoom));
    }

    fn advance_phase(&mut self) {
        if self.phase == Phase::Initializing && self.day_settled && self.status_settled {
            info!("page ready");
            self.phase = Phase::Ready;
        }
    }

    /// Render-ready copy of the state as seen at `now`.
    #[must_use]
    pub fn view(&self, now: DateTime<Utc>) -> PageView {
        let status_line = match &self.status {
            StatusState::Pending => STATUS_LOADING.to_string(),
            StatusState::Loaded(snapshot) => describe(Some(snapshot), now),
            StatusState::Unavailable => describe(None, now),
        };

        PageView {
            phase: self.phase,
            date: api_format(self.selected),
            date_value: native_value(self.selected),
            date_label: date_label(self.selected),
            is_today: self.selected == today(),
            zoom: self.zoom,
            loading: self.day_in_flight,
            status_line,
            marker_count: self.markers.len(),
            markers: self.markers.markers().to_vec(),
            map_updated_at: self.map_updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Snapshot published to the surfaces after every state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub phase: Phase,
    /// Selected day, `DD/MM/YYYY`.
    pub date: String,
    /// Selected day, `YYYY-MM-DD`.
    pub date_value: String,
    pub date_label: String,
    pub is_today: bool,
    pub zoom: f64,
    pub loading: bool,
    pub status_line: String,
    pub marker_count: usize,
    pub markers: Vec<Marker>,
    pub map_updated_at: Option<String>,
}

/// Result of a spawned fetch, tagged with its ticket.
#[derive(Debug)]
enum Outcome {
    Day(DayTicket, Result<Vec<EventRecord>, QuakeError>),
    Status(StatusTicket, Result<StatusSnapshot, QuakeError>),
}

/// Handle used by the surfaces to talk to a running orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<PageView>,
    cancel: CancellationToken,
}

impl OrchestratorHandle {
    /// Queue a command. Returns `false` if the orchestrator has stopped.
    pub async fn send(&self, command: Command) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// A receiver that wakes on every published view.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PageView> {
        self.view.clone()
    }

    /// The latest published view.
    #[must_use]
    pub fn current(&self) -> PageView {
        self.view.borrow().clone()
    }

    /// Stop the run loop and any in-flight fetches.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Drives `AppState` from commands, timers and fetch results.
pub struct Orchestrator<S: QuakeSource> {
    source: Arc<S>,
    config: PipelineConfig,
    state: AppState,
    view_tx: watch::Sender<PageView>,
    outcome_tx: mpsc::UnboundedSender<Outcome>,
    cancel: CancellationToken,
}

/// Start an orchestrator on the current tokio runtime.
///
/// The run loop stops when `cancel` fires.
pub fn spawn<S: QuakeSource>(
    source: Arc<S>,
    config: PipelineConfig,
    cancel: CancellationToken,
) -> (OrchestratorHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

    let state = AppState::new(today(), config.zoom);
    let (view_tx, view_rx) = watch::channel(state.view(Utc::now()));

    let orchestrator = Orchestrator {
        source,
        config,
        state,
        view_tx,
        outcome_tx,
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(orchestrator.run(command_rx, outcome_rx));

    let handle = OrchestratorHandle {
        commands: command_tx,
        view: view_rx,
        cancel,
    };
    (handle, task)
}

impl<S: QuakeSource> Orchestrator<S> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut outcomes: mpsc::UnboundedReceiver<Outcome>,
    ) {
        let cancel = self.cancel.clone();

        let initial = tokio::select! {
            () = cancel.cancelled() => return,
            date = self.resolve_initial_date() => date,
        };
        info!("initial date {}", api_format(initial));
        self.state.select(initial);
        self.fetch_day();
        self.fetch_status();
        self.publish();

        let map_every = self.config.map_interval;
        let status_every = self.config.status_interval;
        let mut map_tick = interval_at(Instant::now() + map_every, map_every);
        map_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut status_tick = interval_at(Instant::now() + status_every, status_every);
        status_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                Some(command) = commands.recv() => self.handle(command),
                Some(outcome) = outcomes.recv() => self.apply(outcome),
                _ = map_tick.tick() => {
                    debug!("map timer fired");
                    self.fetch_day();
                    self.publish();
                }
                _ = status_tick.tick() => {
                    debug!("status timer fired");
                    self.fetch_status();
                    self.publish();
                }
            }
        }

        info!("orchestrator stopped");
    }

    async fn resolve_initial_date(&self) -> NaiveDate {
        match &self.config.initial_date {
            InitialDate::Today => today(),
            InitialDate::Given(text) => parse_day_or(text, today()),
            InitialDate::Latest => match self.source.fetch_latest_date().await {
                Ok(date) => date,
                Err(e) => {
                    warn!("latest-date query failed, using today: {}", e);
                    today()
                }
            },
        }
    }

    fn handle(&mut self, command: Command) {
        debug!("command {:?}", command);
        match command {
            Command::SelectDate(text) => {
                let date = parse_day_or(&text, today());
                self.state.select(date);
                self.fetch_day();
            }
            Command::StepDay(days) => {
                let Some(date) = chrono::Duration::try_days(days)
                    .and_then(|delta| self.state.selected.checked_add_signed(delta))
                else {
                    warn!("cannot move {} days from {}", days, api_format(self.state.selected));
                    return;
                };
                self.state.select(date);
                self.fetch_day();
            }
            Command::Refresh => {
                self.fetch_status();
                if self.state.selected == today() {
                    self.fetch_day();
                }
            }
            Command::Zoom(zoom) => self.state.set_zoom(zoom),
        }
        self.publish();
    }

    fn apply(&mut self, outcome: Outcome) {
        let now = Utc::now();
        match outcome {
            Outcome::Day(ticket, result) => {
                self.state.accept_day(ticket, result, now);
            }
            Outcome::Status(ticket, result) => {
                self.state.accept_status(ticket, result);
            }
        }
        self.publish();
    }

    fn fetch_day(&mut self) {
        let ticket = self.state.issue_day();
        let source = Arc::clone(&self.source);
        let tx = self.outcome_tx.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                result = source.fetch_day(ticket.date) => {
                    let _ = tx.send(Outcome::Day(ticket, result));
                }
            }
        });
    }

    fn fetch_status(&mut self) {
        let ticket = self.state.issue_status();
        let source = Arc::clone(&self.source);
        let tx = self.outcome_tx.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                result = source.fetch_status() => {
                    let _ = tx.send(Outcome::Status(ticket, result));
                }
            }
        });
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.state.view(Utc::now()));
    }
}
