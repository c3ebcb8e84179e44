//! Transports
//!
//! A device talks to the registry through one action endpoint and one
//! narrator endpoint. `HttpTransport` goes over the network;
//! `LocalTransport` calls an in-process registry.

use std::sync::Arc;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use werewolf::narrator::{NarratorChain, NarratorRequest, NarratorResponse};
use werewolf::network::dispatch::handle_value;
use werewolf::network::protocol::{ErrorCode, Failure, RoomRequest};
use werewolf::network::registry::RoomRegistry;

use crate::config::ClientConfig;

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Request never completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Body did not decode.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The registry answered `{success: false}`.
    #[error("Rejected ({code:?}): {message}")]
    Rejected {
        /// Failure class.
        code: ErrorCode,
        /// Server message.
        message: String,
    },

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The push channel closed.
    #[error("Connection closed")]
    Closed,
}

impl From<Failure> for TransportError {
    fn from(failure: Failure) -> Self {
        TransportError::Rejected { code: failure.code, message: failure.error }
    }
}

impl TransportError {
    /// Whether the next poll may succeed without anyone acting.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Rejected { code, .. } => {
                matches!(code, ErrorCode::Internal | ErrorCode::Unavailable)
            }
            _ => true,
        }
    }

    /// Failure class, if the server answered.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            TransportError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Carries requests to the registry.
#[async_trait]
pub trait RoomTransport: Send + Sync {
    /// Send one action and return the raw envelope.
    async fn call(&self, request: &RoomRequest) -> Result<Value, TransportError>;

    /// Ask the narrator.
    async fn narrate(&self, request: &NarratorRequest) -> Result<NarratorResponse, TransportError>;
}

// =============================================================================
// HTTP
// =============================================================================

/// Transport over the server's HTTP API.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a client with the configured timeout.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, base_url: config.base_url.clone() })
    }
}

#[async_trait]
impl RoomTransport for HttpTransport {
    async fn call(&self, request: &RoomRequest) -> Result<Value, TransportError> {
        let url = format!("{}/api/room", self.base_url);
        debug!("POST {} action={}", url, request.action.name());

        // Failures carry a JSON body too, so the status is not checked here
        let response = self.client
            .post(&url)
            .json(&request.to_value()?)
            .send()
            .await?;
        Ok(response.json::<Value>().await?)
    }

    async fn narrate(&self, request: &NarratorRequest) -> Result<NarratorResponse, TransportError> {
        let url = format!("{}/api/host", self.base_url);
        let response = self.client
            .post(&url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<NarratorResponse>().await?)
    }
}

// =============================================================================
// IN-PROCESS
// =============================================================================

/// Transport straight into a registry in the same process.
#[derive(Clone)]
pub struct LocalTransport {
    registry: Arc<RoomRegistry>,
    narrator: NarratorChain,
}

impl LocalTransport {
    /// Wrap `registry`; the narrator is the rule-based mock.
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry, narrator: NarratorChain::mock_only() }
    }

    /// Use `narrator` instead of the mock.
    pub fn with_narrator(mut self, narrator: NarratorChain) -> Self {
        self.narrator = narrator;
        self
    }

    /// The wrapped registry.
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }
}

#[async_trait]
impl RoomTransport for LocalTransport {
    async fn call(&self, request: &RoomRequest) -> Result<Value, TransportError> {
        let (_, body) = handle_value(&self.registry, request.to_value()?).await;
        Ok(body)
    }

    async fn narrate(&self, request: &NarratorRequest) -> Result<NarratorResponse, TransportError> {
        Ok(self.narrator.ask(request).await)
    }
}

/// Local transport that drops the next call of one action.
#[cfg(test)]
pub(crate) struct FlakyTransport {
    inner: LocalTransport,
    fail_next: std::sync::Mutex<Option<&'static str>>,
}

#[cfg(test)]
impl FlakyTransport {
    pub(crate) fn new(inner: LocalTransport) -> Self {
        Self { inner, fail_next: std::sync::Mutex::new(None) }
    }

    /// The next call of `action` fails with `Closed`.
    pub(crate) fn fail_once(&self, action: &'static str) {
        *self.fail_next.lock().unwrap() = Some(action);
    }
}

#[cfg(test)]
#[async_trait]
impl RoomTransport for FlakyTransport {
    async fn call(&self, request: &RoomRequest) -> Result<Value, TransportError> {
        let drop_it = {
            let mut fail_next = self.fail_next.lock().unwrap();
            if *fail_next == Some(request.action.name()) {
                *fail_next = None;
                true
            } else {
                false
            }
        };
        if drop_it {
            return Err(TransportError::Closed);
        }
        self.inner.call(request).await
    }

    async fn narrate(&self, request: &NarratorRequest) -> Result<NarratorResponse, TransportError> {
        self.inner.narrate(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use werewolf::network::protocol::RoomAction;

    #[tokio::test]
    async fn test_local_transport_round_trip() {
        let transport = LocalTransport::new(Arc::new(RoomRegistry::default()));
        let request = RoomRequest::new(
            RoomAction::Create { player_name: "Alice".into(), avatar_data_url: None },
            None,
            "d1",
        );

        let body = transport.call(&request).await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["isHost"], true);
        assert_eq!(body["roomCode"].as_str().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_local_transport_failure_is_a_body() {
        let transport = LocalTransport::new(Arc::new(RoomRegistry::default()));
        let request = RoomRequest {
            action: RoomAction::GetState,
            room_code: Some("ZZZZZZ".into()),
            device_id: "d1".into(),
        };

        let body = transport.call(&request).await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn test_local_narrator_is_mock() {
        let transport = LocalTransport::new(Arc::new(RoomRegistry::default()));
        let request = NarratorRequest { question: "what round is it".into(), ..Default::default() };
        let response = transport.narrate(&request).await.unwrap();
        assert_eq!(response.provider, "mock");
    }

    #[tokio::test]
    async fn test_http_transport_unreachable_is_transient() {
        let mut config = ClientConfig::with_base_url("http://127.0.0.1:9");
        config.request_timeout = std::time::Duration::from_millis(500);
        let transport = HttpTransport::new(&config).unwrap();
        let request = RoomRequest {
            action: RoomAction::GetState,
            room_code: Some("ABCDEF".into()),
            device_id: "d1".into(),
        };

        let err = transport.call(&request).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_rejections_classified() {
        let not_found = TransportError::from(Failure::new(ErrorCode::NotFound, "Room not found"));
        assert!(!not_found.is_transient());
        assert_eq!(not_found.code(), Some(ErrorCode::NotFound));

        let busy = TransportError::from(Failure::new(ErrorCode::Unavailable, "full"));
        assert!(busy.is_transient());
    }
}
