//! Message-bus transport capability.
//!
//! The session controller owns exactly one live [`Connection`] at a time and
//! is the only component allowed to create or close it. Everything else sees
//! the bus through narrow query/publish capabilities handed down by the
//! controller.

pub mod rosbridge;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use easeview_protocol::Credential;

use crate::error::TransportError;

pub use rosbridge::RosbridgeTransport;

/// Lifecycle events emitted by a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The websocket handshake completed.
    Connected,
    /// The connection was closed, deliberately or not.
    Closed,
    /// The connection failed.
    Error { message: String },
}

/// Sender half for connection lifecycle events.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Factory opening bus connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to `url`; lifecycle events flow into `events`.
    ///
    /// `TransportEvent::Connected` is delivered through the channel rather
    /// than implied by the returned handle, so callers observe the same
    /// ordering as with a browser-side websocket.
    async fn connect(
        &self,
        url: &str,
        events: EventSender,
    ) -> Result<Arc<dyn Connection>, TransportError>;
}

/// An open bus connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Present a one-time credential. The credential is forwarded verbatim.
    async fn authenticate(&self, credential: &Credential) -> Result<(), TransportError>;

    /// Publish one message on a topic.
    async fn publish(
        &self,
        topic: &str,
        message_type: &str,
        message: Value,
    ) -> Result<(), TransportError>;

    /// Subscribe to a topic; messages arrive on the returned channel until
    /// the connection goes away.
    async fn subscribe(
        &self,
        topic: &str,
        message_type: &str,
    ) -> Result<mpsc::UnboundedReceiver<Value>, TransportError>;

    /// Call a service and wait for its reply.
    async fn call_service(&self, service: &str, args: Value) -> Result<Value, TransportError>;

    /// Close the connection. Emits `TransportEvent::Closed`, mirroring how a
    /// deliberately closed websocket still fires its close handler.
    async fn close(&self);
}
