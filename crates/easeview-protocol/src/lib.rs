//! Contract types shared between the easeview client and its panel frames.
//!
//! Panels run as isolated content frames (TypeScript in production), so every
//! serde type here carries a `ts-rs` derive and is exported to
//! `bindings/` by the `export_typescript_bindings` test.

pub mod auth;
pub mod episode;
pub mod events;
pub mod panels;
pub mod surface;

pub use auth::Credential;
pub use episode::Episode;
pub use events::PanelEvent;
pub use panels::{FlatPanel, PanelDescriptor, flatten};
pub use surface::{MediaKind, PanelSurface};
