//! Session lifecycle: connect, authenticate, probe, reconnect.
//!
//! The [`SessionController`] owns the single live transport connection and
//! the lifecycle state machine around it. States only move forward within a
//! connection attempt; the sole recovery jump is `Reconnecting → Connecting`.

mod episode;
mod nodes;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use easeview_protocol::{Episode, PanelEvent};

use crate::config::ClientConfig;
use crate::error::QueryError;
use crate::frames::FrameRouter;
use crate::http::BackendApi;
use crate::query::{PROBE_QUERY, QueryGateway};
use crate::scene::SceneView;
use crate::transport::{Connection, Transport, TransportEvent};

pub use episode::EpisodeSelector;
pub use nodes::{RawRecordFormatter, RecordFormatter};

/// Overlay shown while an episode is required but none is selected.
pub const OVERLAY_SELECT_EPISODE: &str = "Please select an Episode";
/// Overlay shown while an episode selection rebuilds the backend.
pub const OVERLAY_LOADING: &str = "Loading knowledge base";
/// Overlay shown after a deliberate or remote connection close.
pub const OVERLAY_CONNECTION_CLOSED: &str = "Connection was closed, reconnecting...";
/// Overlay shown after a connection error.
pub const OVERLAY_CONNECTION_ERROR: &str = "Connection error, reconnecting...";

/// Lifecycle states of the page session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    /// Connected and authenticated, polling for the query service.
    AwaitingService,
    Ready,
    /// Torn down, a reconnect attempt is scheduled.
    Reconnecting,
}

type ReadyCallback = Box<dyn Fn() + Send + Sync>;

/// Owns the transport connection and drives the session state machine.
///
/// All collaborators are capability traits so pages embed the controller with
/// whatever transport, scene and frame surface they have.
pub struct SessionController {
    /// Self-handle for the tasks the controller spawns.
    weak_self: Weak<Self>,
    config: RwLock<ClientConfig>,
    /// Set on the first `connect()`; configuration is immutable afterwards.
    config_locked: AtomicBool,
    transport: Arc<dyn Transport>,
    gateway: Arc<dyn QueryGateway>,
    backend: Arc<dyn BackendApi>,
    router: Arc<FrameRouter>,
    scene: Arc<dyn SceneView>,
    formatter: Arc<dyn RecordFormatter>,
    episode: EpisodeSelector,
    state: Mutex<SessionState>,
    conn: Mutex<Option<Arc<dyn Connection>>>,
    /// Bumped per connection attempt; replies carrying an older generation
    /// are stale and dropped.
    generation: AtomicU64,
    /// Bumped per probe loop so at most one loop polls at a time.
    probe_generation: AtomicU64,
    /// True while a reconnect is scheduled; the close and error paths both
    /// run teardown, but only one of them may arm the timer.
    reconnect_pending: AtomicBool,
    nodes_registered: AtomicBool,
    initial_episode_applied: AtomicBool,
    selected_marker: Mutex<Option<String>>,
    ready_callbacks: Mutex<Vec<ReadyCallback>>,
}

impl SessionController {
    pub async fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        gateway: Arc<dyn QueryGateway>,
        backend: Arc<dyn BackendApi>,
        router: Arc<FrameRouter>,
        scene: Arc<dyn SceneView>,
        formatter: Arc<dyn RecordFormatter>,
    ) -> Arc<Self> {
        let controller = Arc::new_cyclic(|weak| Self {
            weak_self: weak.clone(),
            config: RwLock::new(config),
            config_locked: AtomicBool::new(false),
            transport,
            gateway,
            backend,
            router,
            scene,
            formatter,
            episode: EpisodeSelector::new(),
            state: Mutex::new(SessionState::Disconnected),
            conn: Mutex::new(None),
            generation: AtomicU64::new(0),
            probe_generation: AtomicU64::new(0),
            reconnect_pending: AtomicBool::new(false),
            nodes_registered: AtomicBool::new(false),
            initial_episode_applied: AtomicBool::new(false),
            selected_marker: Mutex::new(None),
            ready_callbacks: Mutex::new(Vec::new()),
        });

        // Episode selections carried by navigation land here.
        let weak = Arc::downgrade(&controller);
        controller
            .router
            .set_episode_handler(Box::new(move |category, id| {
                let Some(controller) = weak.upgrade() else {
                    return;
                };
                let episode = Episode::new(category, id);
                tokio::spawn(async move { controller.set_episode(episode).await });
            }))
            .await;

        controller.spawn_refresh_loop();
        controller
    }

    /// Replace the recorded options. Silently a no-op once `connect()` ran.
    pub async fn configure(&self, config: ClientConfig) {
        if self.config_locked.load(Ordering::SeqCst) {
            debug!("session already connected, ignoring reconfiguration");
            return;
        }
        *self.config.write().await = config;
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    pub fn router(&self) -> &Arc<FrameRouter> {
        &self.router
    }

    pub async fn current_episode(&self) -> Option<Episode> {
        self.episode.current().await
    }

    /// Register a readiness observer.
    ///
    /// Called once immediately if the session is already Ready, then on
    /// every later Ready entry, in registration order.
    pub async fn on_ready(&self, callback: impl Fn() + Send + Sync + 'static) {
        let ready = *self.state.lock().await == SessionState::Ready;
        let callback: ReadyCallback = Box::new(callback);
        if ready {
            invoke_ready(&callback);
        }
        self.ready_callbacks.lock().await.push(callback);
    }

    /// Open the bus connection and start the session.
    ///
    /// Idempotent: only Disconnected or Reconnecting sessions proceed, so
    /// overlapping triggers (initial page load racing a scheduled reconnect)
    /// collapse into one attempt.
    ///
    /// Boxed: the scheduled retry in [`Self::handle_disconnect`] awaits this
    /// future again.
    pub fn connect(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.connect_inner())
    }

    async fn connect_inner(&self) {
        {
            let mut state = self.state.lock().await;
            match *state {
                SessionState::Disconnected | SessionState::Reconnecting => {
                    *state = SessionState::Connecting;
                }
                _ => return,
            }
        }
        self.config_locked.store(true, Ordering::SeqCst);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let url = self.config.read().await.transport_url.clone();
        info!("connecting to {url}");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        match self.transport.connect(&url, events_tx).await {
            Ok(conn) => {
                *self.conn.lock().await = Some(conn);
                self.spawn_event_pump(generation, events_rx);
            }
            Err(error) => {
                warn!("bus connection failed: {error}");
                self.handle_disconnect(generation, OVERLAY_CONNECTION_ERROR)
                    .await;
            }
        }
    }

    /// Make `episode` the active one.
    ///
    /// Broadcasts the resolved library to every panel, then forces a
    /// transport close: the backend keeps per-connection state, so the
    /// working set only fully switches on a fresh connection. A backend
    /// reset request is fired alongside without waiting for it.
    pub async fn set_episode(&self, episode: Episode) {
        info!("selecting episode {}/{}", episode.category, episode.id);

        let conn = self.conn.lock().await.clone();
        let library = match &conn {
            Some(conn) => {
                match self
                    .episode
                    .select(self.gateway.as_ref(), conn.as_ref(), episode)
                    .await
                {
                    Ok(library) => library,
                    Err(error) => {
                        warn!("episode library query failed: {error}");
                        Value::Null
                    }
                }
            }
            None => {
                self.episode.set(episode).await;
                Value::Null
            }
        };

        self.router
            .broadcast(&PanelEvent::EpisodeSelected { library })
            .await;
        self.router.hide_overlay().await;
        self.router.show_overlay(OVERLAY_LOADING).await;

        // Emits a Closed event, which schedules the reconnect.
        if let Some(conn) = conn {
            conn.close().await;
        }

        let backend = self.backend.clone();
        tokio::spawn(async move {
            if let Err(error) = backend.request_reset().await {
                warn!("backend reset request failed: {error:#}");
            }
        });
    }

    /// Select a scene marker, replacing any previous selection.
    /// Re-selecting the current marker is a no-op.
    pub async fn select_marker(&self, marker: &str) {
        let mut selected = self.selected_marker.lock().await;
        if selected.as_deref() == Some(marker) {
            return;
        }
        if let Some(previous) = selected.take() {
            self.scene.unhighlight(&previous);
            if let Some(surface) = self.router.active_panel().await {
                surface.unselect_marker(&previous);
            }
        }
        *selected = Some(marker.to_string());
        self.scene.highlight(marker);
        if let Some(surface) = self.router.active_panel().await {
            surface.select_marker(marker);
        }
    }

    /// Drop the current marker selection, if any.
    pub async fn unselect_marker(&self) {
        let mut selected = self.selected_marker.lock().await;
        let Some(marker) = selected.take() else {
            return;
        };
        self.scene.unhighlight(&marker);
        if let Some(surface) = self.router.active_panel().await {
            surface.unselect_marker(&marker);
        }
    }

    /// A marker disappeared from the scene. Unselects it first if selected.
    pub async fn remove_marker(&self, marker: &str) {
        {
            let mut selected = self.selected_marker.lock().await;
            if selected.as_deref() == Some(marker) {
                *selected = None;
                self.scene.unhighlight(marker);
                if let Some(surface) = self.router.active_panel().await {
                    surface.unselect_marker(marker);
                }
            }
        }
        self.scene.remove_object(marker);
        if let Some(surface) = self.router.active_panel().await {
            surface.remove_marker(marker);
        }
    }

    pub async fn selected_marker(&self) -> Option<String> {
        self.selected_marker.lock().await.clone()
    }

    /// Open the context menu for a marker on the active panel.
    pub async fn show_marker_menu(&self, marker: &str) {
        if let Some(surface) = self.router.active_panel().await {
            surface.show_marker_menu(marker);
        }
    }

    /// A render pass completed; forward it to the active panel.
    pub async fn on_render(&self, camera: &Value, scene: &Value) {
        if let Some(surface) = self.router.active_panel().await {
            surface.on_render(camera, scene);
        }
    }

    fn spawn_event_pump(
        &self,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let Some(controller) = self.weak_self.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if controller.generation.load(Ordering::SeqCst) != generation {
                    break;
                }
                match event {
                    TransportEvent::Connected => controller.on_connected(generation).await,
                    TransportEvent::Closed => {
                        info!("bus connection closed");
                        controller
                            .handle_disconnect(generation, OVERLAY_CONNECTION_CLOSED)
                            .await;
                        break;
                    }
                    TransportEvent::Error { message } => {
                        warn!("bus connection error: {message}");
                        controller
                            .handle_disconnect(generation, OVERLAY_CONNECTION_ERROR)
                            .await;
                        break;
                    }
                }
            }
        });
    }

    async fn on_connected(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        let (authentication, initial_episode) = {
            let config = self.config.read().await;
            (config.authentication, config.initial_episode.clone())
        };
        let Some(conn) = self.conn.lock().await.clone() else {
            return;
        };

        if authentication {
            *self.state.lock().await = SessionState::Authenticating;
            let credential = match self.backend.fetch_credential().await {
                Ok(credential) => credential,
                Err(error) => {
                    // Abandon the attempt; recovery rides on the close event
                    // the unauthenticated server will eventually produce.
                    warn!("credential fetch failed: {error:#}");
                    return;
                }
            };
            // The connection may have died during the fetch.
            if self.generation.load(Ordering::SeqCst) != generation
                || self.conn.lock().await.is_none()
            {
                debug!("discarding credential for a torn-down connection");
                return;
            }
            if let Err(error) = conn.authenticate(&credential).await {
                warn!("bus authentication failed: {error}");
                self.handle_disconnect(generation, OVERLAY_CONNECTION_ERROR)
                    .await;
                return;
            }
        }

        self.register_nodes(conn.clone(), generation).await;

        if !self.initial_episode_applied.swap(true, Ordering::SeqCst) {
            if let Some(episode) = initial_episode {
                // Closes this connection; the next one probes to Ready.
                self.set_episode(episode).await;
                return;
            }
        }

        self.begin_probe(generation, conn).await;
    }

    /// Poll the query service until it answers, then enter Ready.
    ///
    /// Retries are unbounded with a fixed interval. Starting a loop retires
    /// any previous one, so at most one probe is in flight.
    async fn begin_probe(&self, generation: u64, conn: Arc<dyn Connection>) {
        *self.state.lock().await = SessionState::AwaitingService;
        let probe = self.probe_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let interval = self.config.read().await.probe_interval();

        let Some(controller) = self.weak_self.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            loop {
                if controller.generation.load(Ordering::SeqCst) != generation
                    || controller.probe_generation.load(Ordering::SeqCst) != probe
                {
                    return;
                }
                match controller.gateway.query(conn.as_ref(), PROBE_QUERY).await {
                    Ok(_) => break,
                    Err(QueryError::Transport(error)) => {
                        // Disconnect handling owns recovery from here.
                        debug!("probe failed on transport: {error}");
                        return;
                    }
                    Err(QueryError::Service(error)) => {
                        debug!("query service not up yet: {error}");
                    }
                }
                sleep(interval).await;
            }
            // A reply that raced a teardown must not flip a newer session.
            if controller.generation.load(Ordering::SeqCst) != generation
                || controller.probe_generation.load(Ordering::SeqCst) != probe
            {
                return;
            }
            controller.enter_ready(conn).await;
        });
    }

    async fn enter_ready(&self, conn: Arc<dyn Connection>) {
        {
            let mut state = self.state.lock().await;
            if *state == SessionState::Ready {
                return;
            }
            *state = SessionState::Ready;
        }
        info!("query service is up, session ready");

        self.router.hide_overlay().await;
        if self.config.read().await.require_episode && !self.episode.has_episode().await {
            self.router.show_overlay(OVERLAY_SELECT_EPISODE).await;
        }

        // A fresh connection points at no working set until this runs.
        if let Err(error) = self
            .episode
            .reassert(self.gateway.as_ref(), conn.as_ref())
            .await
        {
            warn!("episode re-assertion failed: {error}");
        }

        self.notify_ready().await;
        self.router.broadcast(&PanelEvent::NodesReady).await;
    }

    /// Tear the connection down and schedule exactly one reconnect.
    async fn handle_disconnect(&self, generation: u64, overlay: &str) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close().await;
        }
        self.nodes_registered.store(false, Ordering::SeqCst);
        // Retire any in-flight probe; its reply belongs to the dead
        // connection and must not promote the session.
        self.probe_generation.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().await = SessionState::Reconnecting;
        self.router.show_overlay(overlay).await;

        if self.reconnect_pending.swap(true, Ordering::SeqCst) {
            return;
        }
        let delay = self.config.read().await.reconnect_delay();
        let Some(controller) = self.weak_self.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            sleep(delay).await;
            controller.reconnect_pending.store(false, Ordering::SeqCst);
            controller.connect().await;
        });
    }

    async fn notify_ready(&self) {
        let callbacks = self.ready_callbacks.lock().await;
        for callback in callbacks.iter() {
            invoke_ready(callback);
        }
    }

    fn spawn_refresh_loop(&self) {
        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            loop {
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                if let Err(error) = controller.backend.refresh_session().await {
                    warn!("session refresh failed: {error:#}");
                }
                let interval = controller.config.read().await.refresh_interval();
                drop(controller);
                sleep(interval).await;
            }
        });
    }
}

/// One observer panicking must not block delivery to the rest.
fn invoke_ready(callback: &ReadyCallback) {
    if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
        warn!("ready observer panicked");
    }
}
