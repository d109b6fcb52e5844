//! Client configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use easeview_protocol::Episode;

/// Poll period for the query-service readiness probe.
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 500;

/// Fixed delay before a scheduled reconnect attempt. Deliberately constant:
/// the reconnect loop favors availability over backoff growth.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 500;

/// Interval between keep-alive messages published on the bus.
pub const DEFAULT_KEEPALIVE_INTERVAL_MS: u64 = 30_000;

/// Interval between backend session refresh calls.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 570_000;

/// Options recorded by `SessionController::configure`.
///
/// Loadable from a TOML file with `EASEVIEW_*` environment overrides; every
/// field has a default so an empty file is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Websocket URL of the message bus.
    pub transport_url: String,
    /// Whether the bus requires a rosauth handshake.
    pub authentication: bool,
    /// Endpoint serving one-time websocket credentials.
    pub auth_url: String,
    /// Keep-alive endpoint refreshing the backend session.
    pub refresh_url: String,
    /// Endpoint resetting the backend working set on episode change.
    pub reset_url: String,
    /// Episode applied automatically on the first connect.
    pub initial_episode: Option<Episode>,
    /// Block active use behind an episode selection.
    pub require_episode: bool,
    pub probe_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    pub keepalive_interval_ms: u64,
    pub refresh_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport_url: "ws://localhost:9090".to_string(),
            authentication: true,
            auth_url: "/wsauth/v1.0/by_session".to_string(),
            refresh_url: "/api/v1.0/refresh_by_session".to_string(),
            reset_url: "/knowrob/reset".to_string(),
            initial_episode: None,
            require_episode: false,
            probe_interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            keepalive_interval_ms: DEFAULT_KEEPALIVE_INTERVAL_MS,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file plus `EASEVIEW_*` env overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("EASEVIEW"))
            .build()
            .context("Failed to read client configuration")?;

        settings
            .try_deserialize()
            .context("Invalid client configuration")
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.authentication);
        assert!(!config.require_episode);
        assert_eq!(config.probe_interval_ms, 500);
        assert_eq!(config.reconnect_delay_ms, 500);
        assert_eq!(config.refresh_interval_ms, 570_000);
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
transport_url = "wss://data.example.org/ws"
authentication = false
require_episode = true

[initial_episode]
category = "pick-and-place"
id = "ep-042"
"#
        )
        .unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.transport_url, "wss://data.example.org/ws");
        assert!(!config.authentication);
        assert!(config.require_episode);
        let episode = config.initial_episode.unwrap();
        assert_eq!(episode.category, "pick-and-place");
        assert_eq!(episode.id, "ep-042");
        // untouched fields keep their defaults
        assert_eq!(config.keepalive_interval_ms, 30_000);
    }
}
