//! Shared test doubles for session lifecycle tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use easeview::config::ClientConfig;
use easeview::error::{QueryError, TransportError};
use easeview::frames::{FrameRouter, PanelHost};
use easeview::http::BackendApi;
use easeview::query::QueryGateway;
use easeview::scene::SceneView;
use easeview::session::{RawRecordFormatter, SessionController};
use easeview::transport::{Connection, EventSender, Transport, TransportEvent};
use easeview_protocol::{Credential, PanelDescriptor, PanelSurface};

use std::sync::Mutex;

pub fn test_config() -> ClientConfig {
    ClientConfig {
        transport_url: "ws://test:9090".to_string(),
        authentication: false,
        probe_interval_ms: 10,
        reconnect_delay_ms: 10,
        keepalive_interval_ms: 60_000,
        refresh_interval_ms: 3_600_000,
        ..ClientConfig::default()
    }
}

/// Transport handing out scripted connections and exposing their event
/// senders so tests can fire lifecycle events by hand.
#[derive(Default)]
pub struct MockTransport {
    pub connect_count: AtomicUsize,
    senders: Mutex<Vec<EventSender>>,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockTransport {
    pub fn sender(&self, index: usize) -> EventSender {
        self.senders.lock().unwrap()[index].clone()
    }

    pub fn connection(&self, index: usize) -> Arc<MockConnection> {
        self.connections.lock().unwrap()[index].clone()
    }

    pub fn connects(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        _url: &str,
        events: EventSender,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        let conn = Arc::new(MockConnection::new(events.clone()));
        self.senders.lock().unwrap().push(events.clone());
        self.connections.lock().unwrap().push(conn.clone());
        // handshake completes immediately
        let _ = events.send(TransportEvent::Connected);
        Ok(conn)
    }
}

pub struct MockConnection {
    events: EventSender,
    closed: AtomicBool,
    pub credentials: Mutex<Vec<Credential>>,
    pub published: Mutex<Vec<(String, Value)>>,
    topics: Mutex<HashMap<String, mpsc::UnboundedSender<Value>>>,
}

impl MockConnection {
    fn new(events: EventSender) -> Self {
        Self {
            events,
            closed: AtomicBool::new(false),
            credentials: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Inject a message on a subscribed topic.
    pub fn publish_to_client(&self, topic: &str, message: Value) {
        if let Some(sender) = self.topics.lock().unwrap().get(topic) {
            let _ = sender.send(message);
        }
    }

    pub fn auth_count(&self) -> usize {
        self.credentials.lock().unwrap().len()
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn authenticate(&self, credential: &Credential) -> Result<(), TransportError> {
        self.credentials.lock().unwrap().push(credential.clone());
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        _message_type: &str,
        message: Value,
    ) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), message));
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        _message_type: &str,
    ) -> Result<mpsc::UnboundedReceiver<Value>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.topics.lock().unwrap().insert(topic.to_string(), tx);
        Ok(rx)
    }

    async fn call_service(&self, _service: &str, _args: Value) -> Result<Value, TransportError> {
        Ok(json!({}))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(TransportEvent::Closed);
        }
    }
}

/// Gateway answering from a scripted reply queue; an exhausted queue keeps
/// answering success.
#[derive(Default)]
pub struct MockGateway {
    replies: Mutex<Vec<Result<Value, String>>>,
    pub queries: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn scripted(replies: Vec<Result<Value, String>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn saw_query(&self, text: &str) -> bool {
        self.queries.lock().unwrap().iter().any(|q| q == text)
    }
}

#[async_trait]
impl QueryGateway for MockGateway {
    async fn query(&self, _conn: &dyn Connection, text: &str) -> Result<Value, QueryError> {
        self.queries.lock().unwrap().push(text.to_string());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Ok(json!({"solution": {}}));
        }
        replies.remove(0).map_err(QueryError::Service)
    }
}

/// Gateway holding every reply until released, for exercising replies that
/// are still in flight when the connection dies.
pub struct GatedGateway {
    gate: tokio::sync::Semaphore,
    pub queries: Mutex<Vec<String>>,
}

impl GatedGateway {
    pub fn new() -> Self {
        Self {
            gate: tokio::sync::Semaphore::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Let `count` held queries complete.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }
}

#[async_trait]
impl QueryGateway for GatedGateway {
    async fn query(&self, _conn: &dyn Connection, text: &str) -> Result<Value, QueryError> {
        self.queries.lock().unwrap().push(text.to_string());
        match self.gate.acquire().await {
            Ok(permit) => {
                permit.forget();
                Ok(json!({"solution": {}}))
            }
            Err(_) => Err(QueryError::Service("gateway shut down".to_string())),
        }
    }
}

/// Backend with switchable credential availability and call counters.
pub struct MockBackend {
    pub credential_ok: AtomicBool,
    pub fetch_count: AtomicUsize,
    pub refresh_count: AtomicUsize,
    pub reset_count: AtomicUsize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            credential_ok: AtomicBool::new(true),
            fetch_count: AtomicUsize::new(0),
            refresh_count: AtomicUsize::new(0),
            reset_count: AtomicUsize::new(0),
        }
    }
}

impl MockBackend {
    pub fn resets(&self) -> usize {
        self.reset_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendApi for MockBackend {
    async fn fetch_credential(&self) -> Result<Credential> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if !self.credential_ok.load(Ordering::SeqCst) {
            return Err(anyhow!("not logged in"));
        }
        Ok(Credential {
            mac: "mac-1".to_string(),
            client: "10.0.0.1".to_string(),
            dest: "10.0.0.2".to_string(),
            rand: "nonce".to_string(),
            t: 1_700_000_000,
            level: "user".to_string(),
            end: 1_700_000_600,
        })
    }

    async fn refresh_session(&self) -> Result<()> {
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn request_reset(&self) -> Result<()> {
        self.reset_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Surface recording every hook invocation.
#[derive(Default)]
pub struct RecordingSurface {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PanelSurface for RecordingSurface {
    fn on_register_nodes(&self) {
        self.record("register_nodes".to_string());
    }
    fn on_episode_selected(&self, library: &Value) {
        self.record(format!("episode_selected {library}"));
    }
    fn on_designator_received(&self, html: &str) {
        self.record(format!("designator {html}"));
    }
    fn on_image_received(&self, html: &str, _media: easeview_protocol::MediaKind) {
        self.record(format!("image {html}"));
    }
    fn on_camera_pose_received(&self, pose: &Value) {
        self.record(format!("camera_pose {pose}"));
    }
    fn select_marker(&self, marker: &str) {
        self.record(format!("select {marker}"));
    }
    fn unselect_marker(&self, marker: &str) {
        self.record(format!("unselect {marker}"));
    }
    fn remove_marker(&self, marker: &str) {
        self.record(format!("remove {marker}"));
    }
    fn show_marker_menu(&self, marker: &str) {
        self.record(format!("menu {marker}"));
    }
}

/// Minimal in-memory panel host with one surface per created frame.
#[derive(Default)]
pub struct TestHost {
    pub overlays: Mutex<Vec<String>>,
    sources: Mutex<HashMap<String, String>>,
    surfaces: Mutex<HashMap<String, Arc<RecordingSurface>>>,
}

impl TestHost {
    pub fn surface_for(&self, panel_id: &str) -> Arc<RecordingSurface> {
        self.surfaces
            .lock()
            .unwrap()
            .entry(panel_id.to_string())
            .or_default()
            .clone()
    }

    pub fn overlay_log(&self) -> Vec<String> {
        self.overlays.lock().unwrap().clone()
    }
}

impl PanelHost for TestHost {
    fn create_frame(&self, panel_id: &str, source: &str) {
        self.sources
            .lock()
            .unwrap()
            .insert(panel_id.to_string(), source.to_string());
    }
    fn remove_frame(&self, panel_id: &str) {
        self.sources.lock().unwrap().remove(panel_id);
    }
    fn set_frame_visible(&self, _panel_id: &str, _visible: bool) {}
    fn set_frame_selected(&self, _panel_id: &str, _selected: bool) {}
    fn frame_source(&self, panel_id: &str) -> Option<String> {
        self.sources.lock().unwrap().get(panel_id).cloned()
    }
    fn set_frame_source(&self, panel_id: &str, source: &str) {
        self.sources
            .lock()
            .unwrap()
            .insert(panel_id.to_string(), source.to_string());
    }
    fn surface(&self, panel_id: &str) -> Option<Arc<dyn PanelSurface>> {
        if !self.sources.lock().unwrap().contains_key(panel_id) {
            return None;
        }
        Some(self.surface_for(panel_id))
    }
    fn show_overlay(&self, text: &str) {
        self.overlays.lock().unwrap().push(text.to_string());
    }
    fn hide_overlay(&self) {
        self.overlays.lock().unwrap().push("<hidden>".to_string());
    }
    fn update_menu(&self, _panel_id: &str) {}
}

/// Scene recording highlight traffic.
#[derive(Default)]
pub struct RecordingScene {
    pub ops: Mutex<Vec<String>>,
}

impl RecordingScene {
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }
}

impl SceneView for RecordingScene {
    fn add_object(&self, marker: &str, _object: &Value) {
        self.ops.lock().unwrap().push(format!("add {marker}"));
    }
    fn remove_object(&self, marker: &str) {
        self.ops.lock().unwrap().push(format!("remove {marker}"));
    }
    fn highlight(&self, marker: &str) {
        self.ops.lock().unwrap().push(format!("highlight {marker}"));
    }
    fn unhighlight(&self, marker: &str) {
        self.ops
            .lock()
            .unwrap()
            .push(format!("unhighlight {marker}"));
    }
}

pub struct Harness<G = MockGateway> {
    pub controller: Arc<SessionController>,
    pub transport: Arc<MockTransport>,
    pub gateway: Arc<G>,
    pub backend: Arc<MockBackend>,
    pub host: Arc<TestHost>,
    pub scene: Arc<RecordingScene>,
    pub router: Arc<FrameRouter>,
}

impl<G: QueryGateway + 'static> Harness<G> {
    pub async fn new(config: ClientConfig, gateway: G) -> Self {
        let transport = Arc::new(MockTransport::default());
        let gateway = Arc::new(gateway);
        let backend = Arc::new(MockBackend::default());
        let host = Arc::new(TestHost::default());
        let scene = Arc::new(RecordingScene::default());
        let router = Arc::new(FrameRouter::new(
            host.clone(),
            vec![PanelDescriptor::leaf("kb", "/static/kb.html")],
            "kb",
        ));
        let controller = SessionController::new(
            config,
            transport.clone(),
            gateway.clone(),
            backend.clone(),
            router.clone(),
            scene.clone(),
            Arc::new(RawRecordFormatter),
        )
        .await;
        Self {
            controller,
            transport,
            gateway,
            backend,
            host,
            scene,
            router,
        }
    }
}
