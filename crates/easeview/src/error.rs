//! Client error taxonomy.
//!
//! Transport and auth failures all funnel into the controller's single
//! reconnect path; these types exist for the capability seams, not for
//! user-facing reporting.

use thiserror::Error;

/// Message-bus transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The websocket handshake or stream failed.
    #[error("websocket failure: {0}")]
    WebSocket(String),

    /// The connection is gone; an in-flight operation was dropped.
    #[error("connection closed")]
    ConnectionClosed,

    /// A frame arrived that does not follow the bus protocol.
    #[error("malformed bus message: {0}")]
    Malformed(String),
}

/// One-shot query errors.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The underlying transport failed mid-query.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The query service replied with an error. While the session is
    /// waiting for the service this is expected and just means "poll again".
    #[error("query service error: {0}")]
    Service(String),
}
