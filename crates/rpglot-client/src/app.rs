//! Main client application.
//!
//! The event loop owns the snapshot store and the selection controller.
//! Provider events and key presses are handled one at a time, each to
//! completion, and the navigation address is persisted after every step.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use crossterm::event::KeyEvent;
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::{debug, info, warn};

use rpglot_client_core::address::NavAddress;
use rpglot_client_core::controller::SelectionController;
use rpglot_client_core::provider::http::HttpTransport;
use rpglot_client_core::provider::{
    Direction, EventReceiver, EventSource, HistoryProvider, HistoryStep, LiveProvider,
    ProviderError, ProviderEvent, SnapshotFetcher, StreamErrorAction, classify_stream_error,
    event_channel,
};
use rpglot_client_core::schema::{Catalog, Mode};
use rpglot_client_core::session::{AuthConfig, Credential, SessionContext};
use rpglot_client_core::store::SnapshotStore;
use rpglot_client_core::tui::{Event, InputState, KeyAction, TerminalEvents, handle_key};

use crate::address_file::AddressFile;
use crate::render::render;

pub const REAUTH_NOTICE: &str =
    "Authentication required: restart with --token or --user/--password";

/// Anything that serves both snapshot endpoints.
pub trait Transport: SnapshotFetcher + EventSource {}

impl<T: SnapshotFetcher + EventSource> Transport for T {}

/// The active snapshot source. Exactly one exists per session.
pub enum Source<T: Transport> {
    Live(LiveProvider<Arc<T>>),
    History(HistoryProvider<Arc<T>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    /// No snapshot yet.
    Connecting,
    Connected,
    /// Live stream dropped; the provider is reconnecting.
    Reconnecting,
    /// Credentials missing or rejected; the live stream is closed.
    ReauthRequired,
}

pub struct Config {
    pub url: String,
    pub credential: Option<Credential>,
    /// Address given on the command line; wins over the persisted one.
    pub seed: Option<NavAddress>,
    pub address_file: Option<AddressFile>,
    pub debounce: Duration,
    pub retry_delay: Duration,
    pub tick_rate: Duration,
}

pub struct App<T: Transport> {
    controller: SelectionController,
    store: SnapshotStore,
    input: InputState,
    source: Source<T>,
    session: SessionContext,
    address_file: Option<AddressFile>,
    connection: Connection,
    should_quit: bool,
}

impl<T: Transport> App<T> {
    pub fn new(
        controller: SelectionController,
        source: Source<T>,
        session: SessionContext,
        address_file: Option<AddressFile>,
    ) -> Self {
        let is_live = matches!(source, Source::Live(_));
        Self {
            controller,
            store: SnapshotStore::new(),
            input: InputState::new(is_live),
            source,
            session,
            address_file,
            connection: Connection::Connecting,
            should_quit: false,
        }
    }

    pub fn controller(&self) -> &SelectionController {
        &self.controller
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn connection(&self) -> Connection {
        self.connection
    }

    pub fn is_live(&self) -> bool {
        matches!(self.source, Source::Live(_))
    }

    pub fn is_paused(&self) -> bool {
        match &self.source {
            Source::Live(live) => live.is_paused(),
            Source::History(_) => false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    // ============================================================
    // Provider events
    // ============================================================

    pub fn on_provider_event(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::Snapshot(snapshot) => {
                // Events queued before a pause are held back here.
                let snapshot = match &self.source {
                    Source::Live(live) => match live.admit(snapshot) {
                        Some(s) => s,
                        None => return,
                    },
                    Source::History(_) => snapshot,
                };
                if self.store.replace(Arc::clone(&snapshot)) {
                    if self.connection != Connection::ReauthRequired {
                        self.connection = Connection::Connected;
                    }
                    self.controller.on_snapshot(snapshot);
                }
            }
            ProviderEvent::TransientError(err) => {
                match classify_stream_error(&self.session, &err) {
                    StreamErrorAction::Reauthenticate => self.require_reauth(),
                    StreamErrorAction::AwaitReconnect => {
                        if self.connection != Connection::ReauthRequired {
                            self.connection = Connection::Reconnecting;
                        }
                    }
                }
            }
            ProviderEvent::Failed(err) => {
                warn!(error = %err, "snapshot source gave up");
                if err == ProviderError::Unauthorized {
                    self.require_reauth();
                } else {
                    self.store.set_error(err.to_string());
                }
            }
        }
        self.persist_address();
    }

    fn require_reauth(&mut self) {
        if self.connection == Connection::ReauthRequired {
            return;
        }
        warn!("server requires authentication");
        if let Source::Live(live) = &mut self.source {
            live.stop();
        }
        self.connection = Connection::ReauthRequired;
        self.store.set_error(REAUTH_NOTICE);
    }

    // ============================================================
    // Keys
    // ============================================================

    pub fn on_key(&mut self, key: KeyEvent) {
        match handle_key(&mut self.input, &mut self.controller, key) {
            KeyAction::None => {}
            KeyAction::Quit => self.should_quit = true,
            KeyAction::TogglePause => self.toggle_pause(),
            KeyAction::HistoryStep(step) => self.history_step(step),
            KeyAction::JumpToTime(ts) => {
                if let Source::History(history) = &mut self.source {
                    debug!(ts, "time jump");
                    history.jump_to(ts, Some(Direction::Floor));
                }
            }
        }
        self.persist_address();
    }

    /// Pausing records the shown snapshot in the address; resuming removes it.
    fn toggle_pause(&mut self) {
        let Source::Live(live) = &self.source else {
            return;
        };
        if live.is_paused() {
            live.resume();
            self.controller.set_timestamp(None);
        } else {
            live.pause();
            let shown = self.store.current().map(|s| s.timestamp);
            self.controller.set_timestamp(shown);
        }
    }

    fn history_step(&mut self, step: HistoryStep) {
        let Source::History(history) = &mut self.source else {
            return;
        };
        let Some(current) = self.store.current() else {
            return;
        };
        if !history.step(current, step) {
            let edge = match step {
                HistoryStep::Back | HistoryStep::HourBack => "At the first snapshot",
                HistoryStep::Forward | HistoryStep::HourForward => "At the latest snapshot",
            };
            self.input.status_message = Some(edge.to_string());
        }
    }

    fn persist_address(&mut self) {
        let Some(address) = self.controller.take_address_update() else {
            return;
        };
        debug!(%address, "address changed");
        if let Some(file) = &self.address_file
            && let Err(e) = file.save(&address)
        {
            warn!(path = %file.path().display(), error = %e, "cannot save address");
        }
    }

    /// Stops the source and closes the store. Nothing is delivered afterwards.
    pub async fn shutdown(mut self) {
        self.persist_address();
        self.store.close();
        match self.source {
            Source::Live(mut live) => {
                if let Some(subscription) = live.take_subscription() {
                    subscription.unsubscribe().await;
                }
            }
            Source::History(mut history) => history.shutdown(),
        }
        info!("client stopped");
    }
}

// ============================================================
// Startup and the event loop
// ============================================================

pub async fn run(config: Config) -> anyhow::Result<()> {
    let transport = HttpTransport::new(SessionContext::new(&config.url, config.credential))?;

    let auth = match transport.fetch_auth_config().await {
        Ok(auth) => auth,
        Err(e) => {
            warn!(error = %e, "auth config unavailable, assuming an open server");
            AuthConfig::default()
        }
    };
    let session = transport.session().clone().with_auth(auth);
    if session.needs_reauth() {
        bail!(REAUTH_NOTICE);
    }
    let transport = Arc::new(transport.with_session(session.clone()));

    let schema = transport
        .fetch_schema()
        .await
        .with_context(|| format!("failed to fetch schema from {}", session.base_url()))?;
    info!(
        url = session.base_url(),
        server_version = %schema.version,
        mode = ?schema.mode,
        "connected"
    );
    let catalog = Arc::new(Catalog::from_schema(schema));

    let seed = config
        .seed
        .or_else(|| config.address_file.as_ref().and_then(AddressFile::load))
        .unwrap_or_default();
    let controller = SelectionController::new(Arc::clone(&catalog), seed);

    let (tx, mut rx) = event_channel();
    let source = match catalog.mode() {
        Mode::Live => {
            let mut live = LiveProvider::new(Arc::clone(&transport));
            live.start(tx);
            Source::Live(live)
        }
        Mode::History => {
            let mut history = HistoryProvider::new(Arc::clone(&transport), tx)
                .with_debounce(config.debounce)
                .with_retry_delay(config.retry_delay);
            history.load_initial(controller.initial_timestamp());
            Source::History(history)
        }
    };
    let mut app = App::new(controller, source, session, config.address_file);

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut app, &mut terminal, &mut rx, config.tick_rate).await;
    restore_terminal(&mut terminal)?;
    app.shutdown().await;
    result
}

async fn event_loop<T: Transport>(
    app: &mut App<T>,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    rx: &mut EventReceiver,
    tick_rate: Duration,
) -> anyhow::Result<()> {
    let mut events = TerminalEvents::new(tick_rate);
    loop {
        terminal.draw(|frame| render(frame, app))?;

        tokio::select! {
            Some(event) = rx.recv() => app.on_provider_event(event),
            event = events.next() => match event {
                Some(Event::Key(key)) => app.on_key(key),
                Some(Event::Resize(..)) | Some(Event::Tick) => {}
                None => break,
            },
        }

        if app.should_quit() {
            break;
        }
    }
    Ok(())
}

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}
