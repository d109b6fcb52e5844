//! Frame routing: panel registry, navigation, overlay, event fan-out.
//!
//! The router owns the registry of named UI panels, each backed by an
//! isolated content frame behind a [`PanelHost`]. It decides which panel is
//! visible, fans lifecycle/data events into panel surfaces, and guards the
//! single page-level overlay. It never touches the transport.

mod host;
mod nav;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use easeview_protocol::{FlatPanel, PanelDescriptor, PanelEvent, PanelSurface, flatten};

pub use host::PanelHost;
pub use nav::{NavigationQuery, QueryValue};

/// Panel activated when no navigation key matches any registered panel.
pub const DEFAULT_FALLBACK_PANEL: &str = "kb";

/// Callback receiving `(category, episode)` pairs carried by navigation.
pub type EpisodeHandler = Box<dyn Fn(&str, &str) + Send + Sync>;

#[derive(Default)]
struct RouterState {
    /// Panels announced by the backend; replaced wholesale.
    dynamic: Vec<PanelDescriptor>,
    /// Display order: dynamic panels first, then the common ones.
    all: Vec<PanelDescriptor>,
    flat: Vec<FlatPanel>,
    /// Owning top-level panel currently shown.
    active: Option<String>,
    /// Leaf the active panel was resolved from.
    active_leaf: Option<String>,
    overlay_shown: bool,
}

/// Routes navigation state to panels and fans events into their surfaces.
pub struct FrameRouter {
    host: Arc<dyn PanelHost>,
    /// Always-present panels supplied at construction time; survive every
    /// registry replacement.
    common: Vec<PanelDescriptor>,
    fallback: String,
    episode_handler: RwLock<Option<EpisodeHandler>>,
    state: RwLock<RouterState>,
}

impl FrameRouter {
    /// Create a router and the frames for its common panels.
    pub fn new(host: Arc<dyn PanelHost>, common: Vec<PanelDescriptor>, fallback: &str) -> Self {
        for panel in &common {
            if let Some(source) = panel.initial_source() {
                host.create_frame(panel.id(), source);
            }
        }
        let state = RouterState {
            all: common.clone(),
            flat: flatten(&common),
            ..RouterState::default()
        };
        Self {
            host,
            common,
            fallback: fallback.to_string(),
            episode_handler: RwLock::new(None),
            state: RwLock::new(state),
        }
    }

    /// Install the sink receiving episode selections carried by navigation.
    pub async fn set_episode_handler(&self, handler: EpisodeHandler) {
        *self.episode_handler.write().await = Some(handler);
    }

    /// Replace the panel registry with a newly announced interface set.
    ///
    /// Frames of previously registered dynamic panels are removed, one frame
    /// per new top-level panel is created (groups load their first leaf),
    /// and the common panels stay untouched. The replacement is atomic: no
    /// other operation observes a half-updated registry.
    pub async fn register_panels(&self, descriptors: Vec<PanelDescriptor>) {
        {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            for panel in &state.dynamic {
                self.host.remove_frame(panel.id());
            }
            for panel in &descriptors {
                if let Some(source) = panel.initial_source() {
                    self.host.create_frame(panel.id(), source);
                }
            }
            state.dynamic = descriptors;
            state.all = state
                .dynamic
                .iter()
                .chain(self.common.iter())
                .cloned()
                .collect();
            state.flat = flatten(&state.all);
            let stale = state
                .active
                .as_ref()
                .is_some_and(|active| !state.all.iter().any(|p| p.id() == active));
            if stale {
                state.active = None;
                state.active_leaf = None;
            }
        }
        // Never leave zero panels shown once at least one is registered.
        self.ensure_active().await;
    }

    async fn ensure_active(&self) {
        let target = {
            let state = self.state.read().await;
            if state.flat.is_empty() {
                return;
            }
            state
                .active_leaf
                .clone()
                .unwrap_or_else(|| self.fallback.clone())
        };
        self.activate(&target).await;
    }

    /// React to a navigation event with the current location fragment.
    ///
    /// Activates the first flattened panel whose id appears as a key, or the
    /// fallback panel. A fragment carrying both `category` and `episode`
    /// forwards the pair to the episode handler.
    pub async fn navigate(&self, fragment: &str) {
        let query = NavigationQuery::parse(fragment);
        let target = {
            let state = self.state.read().await;
            state
                .flat
                .iter()
                .find(|panel| query.contains(&panel.id))
                .map(|panel| panel.id.clone())
                .unwrap_or_else(|| self.fallback.clone())
        };
        self.activate(&target).await;

        if let (Some(category), Some(episode)) = (query.first("category"), query.first("episode")) {
            debug!("navigation selects episode {category}/{episode}");
            if let Some(handler) = self.episode_handler.read().await.as_ref() {
                handler(category, episode);
            }
        }
    }

    /// Show the panel owning `panel_id`, hiding every other one.
    ///
    /// The frame source is only touched when it differs from what is already
    /// loaded, so re-activating the current panel never forces a reload.
    pub async fn activate(&self, panel_id: &str) {
        let mut state = self.state.write().await;
        let Some(owner) = resolve_owner(&state, panel_id, &self.fallback) else {
            debug!("no panel resolves {panel_id}, nothing to activate");
            return;
        };
        let source = state
            .all
            .iter()
            .find_map(|panel| panel.source_of(panel_id))
            .map(str::to_string)
            .or_else(|| {
                state
                    .all
                    .iter()
                    .find(|panel| panel.id() == owner)
                    .and_then(|panel| panel.initial_source())
                    .map(str::to_string)
            });

        // Steady state: same owner, same loaded source.
        if state.active.as_deref() == Some(owner.as_str()) {
            let loaded = match &source {
                Some(source) => self
                    .host
                    .frame_source(&owner)
                    .is_some_and(|current| current.ends_with(source.as_str())),
                None => true,
            };
            if loaded {
                state.active_leaf = Some(panel_id.to_string());
                return;
            }
        }

        for panel in &state.all {
            if panel.id() != owner {
                self.host.set_frame_visible(panel.id(), false);
                self.host.set_frame_selected(panel.id(), false);
            }
        }

        if let Some(source) = &source {
            let loaded = self.host.frame_source(&owner);
            if !loaded.is_some_and(|current| current.ends_with(source.as_str())) {
                self.host.set_frame_source(&owner, source);
                if let Some(surface) = self.host.surface(&owner) {
                    surface.on_register_nodes();
                }
            }
        }

        self.host.set_frame_visible(&owner, true);
        self.host.set_frame_selected(&owner, true);
        self.host.update_menu(&owner);
        state.active = Some(owner);
        state.active_leaf = Some(panel_id.to_string());
    }

    /// Content handle of the active panel. `None` is the safe fallback when
    /// no frame resolved yet.
    pub async fn active_panel(&self) -> Option<Arc<dyn PanelSurface>> {
        let state = self.state.read().await;
        state.active.as_ref().and_then(|id| self.host.surface(id))
    }

    /// Id of the active top-level panel.
    pub async fn active_panel_id(&self) -> Option<String> {
        self.state.read().await.active.clone()
    }

    /// Fan an event out to every registered panel's surface.
    ///
    /// A panel whose surface is missing (frame not loaded yet) is skipped;
    /// hooks a surface does not override are no-ops by contract.
    pub async fn broadcast(&self, event: &PanelEvent) {
        let ids: Vec<String> = {
            let state = self.state.read().await;
            state.all.iter().map(|panel| panel.id().to_string()).collect()
        };
        for id in ids {
            let Some(surface) = self.host.surface(&id) else {
                continue;
            };
            match event {
                PanelEvent::NodesReady => surface.on_register_nodes(),
                PanelEvent::EpisodeSelected { library } => surface.on_episode_selected(library),
            }
        }
    }

    /// Show the page overlay. Idempotent: while shown, further calls are
    /// no-ops so repeated state-transition triggers cannot flicker it.
    pub async fn show_overlay(&self, text: &str) {
        let mut state = self.state.write().await;
        if state.overlay_shown {
            return;
        }
        state.overlay_shown = true;
        self.host.show_overlay(text);
    }

    /// Hide the page overlay. Idempotent like [`Self::show_overlay`].
    pub async fn hide_overlay(&self) {
        let mut state = self.state.write().await;
        if !state.overlay_shown {
            return;
        }
        state.overlay_shown = false;
        self.host.hide_overlay();
    }
}

/// Top-level panel whose frame shows `panel_id`, with fallback resolution:
/// the requested panel, else the configured fallback, else the first
/// registered panel.
fn resolve_owner(state: &RouterState, panel_id: &str, fallback: &str) -> Option<String> {
    let owner_of = |id: &str| {
        state
            .all
            .iter()
            .find(|panel| panel.contains(id))
            .map(|panel| panel.id().to_string())
    };
    owner_of(panel_id)
        .or_else(|| owner_of(fallback))
        .or_else(|| state.all.first().map(|panel| panel.id().to_string()))
}
