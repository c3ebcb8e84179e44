//! Client configuration.

use std::time::Duration;

/// How a device reaches the registry and how often it polls.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Registry base URL, without a trailing slash.
    pub base_url: String,
    /// WebSocket push URL, if the server runs one.
    pub ws_url: Option<String>,
    /// This device's id, stable across reconnects.
    pub device_id: String,
    /// Poll period while a game runs.
    pub poll_playing: Duration,
    /// Poll period in the lobby.
    pub poll_lobby: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            ws_url: Some("ws://127.0.0.1:3001".to_string()),
            device_id: uuid::Uuid::new_v4().to_string(),
            poll_playing: Duration::from_secs(1),
            poll_lobby: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Default config for `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Poll period for the current room state.
    pub fn poll_interval(&self, in_lobby: bool) -> Duration {
        if in_lobby {
            self.poll_lobby
        } else {
            self.poll_playing
        }
    }
}
