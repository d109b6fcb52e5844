//! Client library connecting the easeview viewer to its messaging backend.
//!
//! The core is the session lifecycle state machine
//! ([`session::SessionController`]) and the frame router
//! ([`frames::FrameRouter`]) it drives. Rendering, the concrete frame
//! surface, and record formatting stay behind capability traits so the
//! library never touches a page directly.

pub mod config;
pub mod error;
pub mod frames;
pub mod http;
pub mod query;
pub mod scene;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use error::{QueryError, TransportError};
pub use frames::{FrameRouter, NavigationQuery, PanelHost, QueryValue};
pub use http::{BackendApi, HttpBackendApi};
pub use query::{PrologGateway, QueryGateway};
pub use scene::{NullScene, SceneView};
pub use session::{EpisodeSelector, RecordFormatter, SessionController, SessionState};
pub use transport::{Connection, Transport, TransportEvent};
