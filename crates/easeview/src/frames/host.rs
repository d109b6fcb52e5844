//! The concrete frame/overlay surface behind the router.

use std::sync::Arc;

use easeview_protocol::PanelSurface;

/// Page-side operations the router drives.
///
/// Implementations wrap whatever actually holds the isolated content frames
/// (a DOM bridge in production). Lookups may miss while a registry
/// replacement is in flight; implementations treat every miss as a no-op and
/// never fail.
pub trait PanelHost: Send + Sync {
    /// Create a content frame for a panel, loading `source`.
    fn create_frame(&self, panel_id: &str, source: &str);

    /// Remove a panel's content frame.
    fn remove_frame(&self, panel_id: &str);

    /// Show or hide a panel's frame.
    fn set_frame_visible(&self, panel_id: &str, visible: bool);

    /// Toggle the "selected" marker on a panel's frame and menu entry.
    fn set_frame_selected(&self, panel_id: &str, selected: bool);

    /// Source URL currently loaded in a panel's frame.
    fn frame_source(&self, panel_id: &str) -> Option<String>;

    /// Point a panel's frame at a new source URL (forces a reload).
    fn set_frame_source(&self, panel_id: &str, source: &str);

    /// Content handle of a panel's frame, if the frame exists and is loaded.
    fn surface(&self, panel_id: &str) -> Option<Arc<dyn PanelSurface>>;

    /// Show the page-level overlay with the given text.
    fn show_overlay(&self, text: &str);

    /// Hide the page-level overlay.
    fn hide_overlay(&self);

    /// Tell the menu collaborator which panel is now active.
    fn update_menu(&self, panel_id: &str);
}
