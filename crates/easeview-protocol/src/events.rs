//! Events fanned out from the client into panel frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Lifecycle/data events broadcast to panels, tagged by `event`.
///
/// A panel that does not implement the matching hook silently ignores the
/// event; absence of a hook is never an error.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "event", rename_all = "snake_case")]
#[ts(export)]
pub enum PanelEvent {
    /// Topic subscriptions for the current connection are in place.
    NodesReady,
    /// An episode was selected and its backend library resolved.
    EpisodeSelected {
        /// Opaque backend library handle for the episode's working set.
        library: Value,
    },
}
