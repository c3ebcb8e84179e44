//! Narrator
//!
//! Flavor text and judge decisions from external chat providers, always
//! backed by a rule-based mock so a failing provider never stalls a game.
//!
//! ## Module Structure
//!
//! - `chat`: OpenAI-compatible chat completion client
//! - `mock`: Keyword rules answered from the public context
//! - `chain`: Ordered providers with per-call timeout, ending in the mock
//! - `judge`: Judge-mode prompt and verdict parsing
//! - `voice`: Text-to-speech with a local-synthesis fallback

pub mod chat;
pub mod mock;
pub mod chain;
pub mod judge;
pub mod voice;

use std::time::Duration;
use async_trait::async_trait;
use serde::{Serialize, Deserialize};

use crate::game::context::NarratorContext;

pub use chain::NarratorChain;
pub use chat::ChatNarrator;
pub use mock::MockNarrator;
pub use voice::{SpeechOutcome, SpeechPort, SpeechService};

/// Neutral line devices show when narration fails outright.
pub const FALLBACK_LINE: &str = "I hear you, continue";

/// Provider name reported by the mock.
pub const MOCK_PROVIDER: &str = "mock";

/// A question for the narrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarratorRequest {
    /// Natural-language prompt.
    #[serde(default)]
    pub question: String,
    /// Public game context.
    #[serde(default)]
    pub game_context: Option<NarratorContext>,
    /// `auto`, `mock`, or a provider name to try first.
    #[serde(default, alias = "provider", skip_serializing_if = "Option::is_none")]
    pub provider_preference: Option<String>,
}

/// The narrator's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarratorResponse {
    /// Answer text.
    pub answer: String,
    /// Which provider answered.
    pub provider: String,
}

/// External capability failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NarratorError {
    /// Provider lacks credentials or an endpoint.
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Transport or HTTP status failure.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Reply could not be used.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Provider took too long.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// A source of narration.
#[async_trait]
pub trait NarratorPort: Send + Sync {
    /// Provider name reported to clients.
    fn name(&self) -> &str;

    /// Answer `question` given the public context, if any.
    async fn ask(&self, question: &str, context: Option<&NarratorContext>) -> Result<String, NarratorError>;
}
