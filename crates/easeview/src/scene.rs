//! 3D scene capability.
//!
//! The rendering engine is an external collaborator; the client only ever
//! drives it through this narrow view.

use serde_json::Value;

/// Operations the client may perform on the 3D canvas.
pub trait SceneView: Send + Sync {
    /// Add a marker object to the scene.
    fn add_object(&self, marker: &str, object: &Value);

    /// Remove a marker object from the scene.
    fn remove_object(&self, marker: &str);

    /// Highlight the object belonging to a marker.
    fn highlight(&self, marker: &str);

    /// Remove the highlight from a marker's object.
    fn unhighlight(&self, marker: &str);
}

/// Scene for pages without a 3D canvas; every operation is a no-op.
#[derive(Debug, Default)]
pub struct NullScene;

impl SceneView for NullScene {
    fn add_object(&self, _marker: &str, _object: &Value) {}
    fn remove_object(&self, _marker: &str) {}
    fn highlight(&self, _marker: &str) {}
    fn unhighlight(&self, _marker: &str) {}
}
