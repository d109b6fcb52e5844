//! Per-connection topic wiring.
//!
//! Once per connection, after authentication, the controller registers its
//! bus endpoints: the keep-alive publisher and the subscriptions feeding
//! logged records into the active panel.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde_json::{Value, json};
use tokio::time::interval;
use tracing::{debug, warn};

use easeview_protocol::MediaKind;

use super::SessionController;
use crate::transport::Connection;

const KEEPALIVE_TOPIC: &str = "/keep_alive";
const KEEPALIVE_TYPE: &str = "std_msgs/Bool";

const DESIGNATOR_TOPIC: &str = "/logged_designators";
const DESIGNATOR_TYPE: &str = "designator_integration_msgs/Designator";

const IMAGE_TOPIC: &str = "/logged_images";
const IMAGE_TYPE: &str = "std_msgs/String";

const CAMERA_POSE_TOPIC: &str = "/camera/pose";
const CAMERA_POSE_TYPE: &str = "geometry_msgs/Pose";

/// Turns raw logged records into the markup handed to panel hooks.
///
/// Formatting itself is page territory; the controller only cares that a
/// record either renders to something or is dropped.
pub trait RecordFormatter: Send + Sync {
    /// Render a designator description. `None` drops the record.
    fn format_designator(&self, description: &Value) -> Option<String>;

    /// Render a logged media URL. `None` drops unknown formats.
    fn format_media(&self, url: &str) -> Option<(String, MediaKind)>;
}

/// Formatter passing records through unrendered. Classifies media by file
/// extension but leaves the markup to the receiving panel.
#[derive(Debug, Default)]
pub struct RawRecordFormatter;

impl RecordFormatter for RawRecordFormatter {
    fn format_designator(&self, description: &Value) -> Option<String> {
        Some(description.to_string())
    }

    fn format_media(&self, url: &str) -> Option<(String, MediaKind)> {
        let kind = media_kind(url)?;
        Some((url.to_string(), kind))
    }
}

/// Media classification by URL extension; `None` for unknown formats.
pub(super) fn media_kind(url: &str) -> Option<MediaKind> {
    let extension = url.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" | "png" | "gif" => Some(MediaKind::Image),
        "ogg" | "ogv" | "mp4" | "mov" | "webm" => Some(MediaKind::Video),
        _ => None,
    }
}

impl SessionController {
    /// Register the connection's bus endpoints. Runs at most once per
    /// connection; the flag is cleared on teardown.
    pub(super) async fn register_nodes(&self, conn: Arc<dyn Connection>, generation: u64) {
        if self.nodes_registered.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(this) = self.weak_self.upgrade() else {
            return;
        };

        self.spawn_keepalive(conn.clone(), generation).await;

        match conn.subscribe(DESIGNATOR_TOPIC, DESIGNATOR_TYPE).await {
            Ok(mut records) => {
                let controller = this.clone();
                tokio::spawn(async move {
                    while let Some(record) = records.recv().await {
                        if controller.generation.load(Ordering::SeqCst) != generation {
                            break;
                        }
                        controller.on_designator(record).await;
                    }
                });
            }
            Err(error) => warn!("designator subscription failed: {error}"),
        }

        match conn.subscribe(IMAGE_TOPIC, IMAGE_TYPE).await {
            Ok(mut records) => {
                let controller = this.clone();
                tokio::spawn(async move {
                    while let Some(record) = records.recv().await {
                        if controller.generation.load(Ordering::SeqCst) != generation {
                            break;
                        }
                        controller.on_image(record).await;
                    }
                });
            }
            Err(error) => warn!("image subscription failed: {error}"),
        }

        match conn.subscribe(CAMERA_POSE_TOPIC, CAMERA_POSE_TYPE).await {
            Ok(mut poses) => {
                let controller = this;
                tokio::spawn(async move {
                    while let Some(pose) = poses.recv().await {
                        if controller.generation.load(Ordering::SeqCst) != generation {
                            break;
                        }
                        if let Some(surface) = controller.router.active_panel().await {
                            surface.on_camera_pose_received(&pose);
                        }
                    }
                });
            }
            Err(error) => warn!("camera pose subscription failed: {error}"),
        }
    }

    /// Periodic dummy publish keeping the socket from idling out.
    async fn spawn_keepalive(&self, conn: Arc<dyn Connection>, generation: u64) {
        let period = self.config.read().await.keepalive_interval();
        let Some(controller) = self.weak_self.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await; // immediate first tick
            loop {
                ticker.tick().await;
                if controller.generation.load(Ordering::SeqCst) != generation {
                    break;
                }
                if conn
                    .publish(KEEPALIVE_TOPIC, KEEPALIVE_TYPE, json!({ "data": true }))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
    }

    async fn on_designator(&self, record: Value) {
        let description = &record["description"];
        if description.as_array().is_none_or(Vec::is_empty) {
            debug!("ignoring empty designator");
            return;
        }
        let Some(html) = self.formatter.format_designator(description) else {
            return;
        };
        if let Some(surface) = self.router.active_panel().await {
            surface.on_designator_received(&html);
        }
    }

    async fn on_image(&self, record: Value) {
        let Some(url) = record["data"].as_str() else {
            debug!("malformed logged image record: {record}");
            return;
        };
        let Some((html, kind)) = self.formatter.format_media(url) else {
            warn!("unknown media format on {IMAGE_TOPIC}: {url}");
            return;
        };
        if let Some(surface) = self.router.active_panel().await {
            surface.on_image_received(&html, kind);
        }
    }
}
