//! Text-to-speech. Without a configured provider, or when it fails, the
//! device is told to synthesize locally.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::config::SpeechConfig;
use super::NarratorError;

/// Synthesized audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    /// MIME type, e.g. `audio/mpeg`.
    pub content_type: String,
    /// Encoded audio.
    pub bytes: Vec<u8>,
}

/// `POST /api/tts` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRequest {
    /// Text to speak.
    #[serde(default)]
    pub text: String,
    /// Voice to use instead of the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_profile: Option<String>,
}

/// Result of a speech request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Provider audio.
    Audio(SpeechAudio),
    /// Synthesize `text` on the device.
    Fallback {
        /// Text to speak locally.
        text: String,
        /// Why the provider was not used.
        reason: String,
    },
}

/// A speech synthesis provider.
#[async_trait]
pub trait SpeechPort: Send + Sync {
    /// Synthesize `text` with `voice`.
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SpeechAudio, NarratorError>;
}

/// Provider speaking `{text, voice}` JSON over HTTP and returning audio.
#[derive(Clone)]
pub struct HttpSpeech {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpSpeech {
    /// Create a client for `url`.
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, url: url.into(), api_key }
    }
}

#[derive(Serialize)]
struct SynthesizeBody<'a> {
    text: &'a str,
    voice: &'a str,
}

#[async_trait]
impl SpeechPort for HttpSpeech {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SpeechAudio, NarratorError> {
        let mut builder = self.client.post(&self.url).json(&SynthesizeBody { text, voice });
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NarratorError::RequestFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(NarratorError::RequestFailed(format!("TTS status {}", response.status())));
        }

        let content_type = response.headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| NarratorError::InvalidResponse(e.to_string()))?;

        if bytes.is_empty() {
            return Err(NarratorError::InvalidResponse("Empty audio".to_string()));
        }
        Ok(SpeechAudio { content_type, bytes: bytes.to_vec() })
    }
}

/// Speech with fallback.
#[derive(Clone)]
pub struct SpeechService {
    provider: Option<Arc<dyn SpeechPort>>,
    default_voice: String,
}

impl SpeechService {
    /// Service over an explicit provider.
    pub fn new(provider: Option<Arc<dyn SpeechPort>>, default_voice: impl Into<String>) -> Self {
        Self { provider, default_voice: default_voice.into() }
    }

    /// Service from configuration; no URL means always fall back.
    pub fn from_config(config: &SpeechConfig) -> Self {
        let provider = config.url.as_ref().map(|url| {
            Arc::new(HttpSpeech::new(url.clone(), config.api_key.clone(), config.timeout)) as Arc<dyn SpeechPort>
        });
        Self::new(provider, config.voice.clone())
    }

    /// Speak `request.text`.
    pub async fn speak(&self, request: &SpeechRequest) -> SpeechOutcome {
        let fallback = |reason: String| SpeechOutcome::Fallback {
            text: request.text.clone(),
            reason,
        };

        let Some(provider) = &self.provider else {
            return fallback("Speech provider not configured".to_string());
        };
        let voice = request.voice_profile.as_deref().unwrap_or(&self.default_voice);

        match provider.synthesize(&request.text, voice).await {
            Ok(audio) => SpeechOutcome::Audio(audio),
            Err(e) => {
                warn!("Speech synthesis failed, device will speak locally: {}", e);
                fallback(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl SpeechPort for Echo {
        async fn synthesize(&self, text: &str, voice: &str) -> Result<SpeechAudio, NarratorError> {
            Ok(SpeechAudio {
                content_type: "audio/test".into(),
                bytes: format!("{}:{}", voice, text).into_bytes(),
            })
        }
    }

    struct Broken;

    #[async_trait]
    impl SpeechPort for Broken {
        async fn synthesize(&self, _text: &str, _voice: &str) -> Result<SpeechAudio, NarratorError> {
            Err(NarratorError::RequestFailed("down".into()))
        }
    }

    fn request(text: &str) -> SpeechRequest {
        SpeechRequest { text: text.into(), voice_profile: None }
    }

    #[tokio::test]
    async fn test_unconfigured_falls_back() {
        let service = SpeechService::from_config(&SpeechConfig::default());
        let outcome = service.speak(&request("Night falls")).await;
        assert!(matches!(outcome, SpeechOutcome::Fallback { ref text, .. } if text == "Night falls"));
    }

    #[tokio::test]
    async fn test_provider_audio_and_voice() {
        let service = SpeechService::new(Some(Arc::new(Echo)), "narrator");
        let outcome = service.speak(&SpeechRequest {
            text: "hi".into(),
            voice_profile: Some("deep".into()),
        }).await;
        match outcome {
            SpeechOutcome::Audio(audio) => assert_eq!(audio.bytes, b"deep:hi".to_vec()),
            other => panic!("expected audio, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back() {
        let service = SpeechService::new(Some(Arc::new(Broken)), "narrator");
        assert!(matches!(service.speak(&request("x")).await, SpeechOutcome::Fallback { .. }));
    }
}
