//! The content-handle contract a panel frame may implement.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// How an embedded media record measures its display size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MediaKind {
    Image,
    Video,
}

/// Hooks a panel's content handle may expose.
///
/// Every hook is optional on the wire; the default no-op bodies model that,
/// so callers invoke hooks unconditionally and panels override only what
/// they care about.
pub trait PanelSurface: Send + Sync {
    /// Topic subscriptions for the current connection are in place.
    fn on_register_nodes(&self) {}

    /// An episode was selected; `library` is the opaque backend handle.
    fn on_episode_selected(&self, _library: &Value) {}

    /// A formatted designator record arrived.
    fn on_designator_received(&self, _html: &str) {}

    /// A formatted image/video record arrived.
    fn on_image_received(&self, _html: &str, _media: MediaKind) {}

    /// The logged camera pose changed.
    fn on_camera_pose_received(&self, _pose: &Value) {}

    /// A scene marker was selected.
    fn select_marker(&self, _marker: &str) {}

    /// The selected scene marker was deselected.
    fn unselect_marker(&self, _marker: &str) {}

    /// A scene marker was removed.
    fn remove_marker(&self, _marker: &str) {}

    /// The context menu for a marker should open.
    fn show_marker_menu(&self, _marker: &str) {}

    /// A render pass completed.
    fn on_render(&self, _camera: &Value, _scene: &Value) {}
}
