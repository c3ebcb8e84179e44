//! OpenAI-compatible chat completion narrator.

use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Serialize, Deserialize};

use crate::config::LlmEndpoint;
use crate::game::context::NarratorContext;
use super::{NarratorError, NarratorPort};

const SYSTEM_PROMPT: &str = "You are an English-speaking game narrator and host for a Werewolf/Mafia game. \
Always reply in English, even if the question is in another language. \
Keep responses SHORT and direct (1-2 sentences maximum). \
Only reveal information players should know - no spoilers about hidden roles or secret actions.";

const MAX_TOKENS: u32 = 80;
const TEMPERATURE: f32 = 0.8;

/// Narrator backed by a chat completion endpoint.
#[derive(Clone)]
pub struct ChatNarrator {
    client: Client,
    endpoint: LlmEndpoint,
    base_url: String,
}

impl ChatNarrator {
    /// Create a client for `endpoint`. The per-request timeout is a backstop;
    /// the chain applies its own bound.
    pub fn new(endpoint: LlmEndpoint, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: endpoint.url.trim_end_matches('/').to_string(),
            endpoint,
        }
    }

    fn user_prompt(question: &str, context: Option<&NarratorContext>) -> String {
        let state = context
            .and_then(|c| serde_json::to_string_pretty(c).ok())
            .unwrap_or_else(|| "Game not started yet".to_string());
        format!(
            "Current Game State:\n{}\n\nPlayer Question: {}\n\nProvide a brief, direct answer in English (1-2 sentences only).",
            state, question
        )
    }
}

#[async_trait]
impl NarratorPort for ChatNarrator {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn ask(&self, question: &str, context: Option<&NarratorContext>) -> Result<String, NarratorError> {
        let request = ChatRequest {
            model: self.endpoint.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: "user".to_string(), content: Self::user_prompt(question, context) },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            stream: false,
        };

        let mut builder = self.client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.endpoint.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NarratorError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(NarratorError::RequestFailed(format!("{}: {}", status, error_text)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| NarratorError::InvalidResponse(e.to_string()))?;

        extract_answer(body)
    }
}

fn extract_answer(body: ChatResponse) -> Result<String, NarratorError> {
    let answer = body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    if answer.is_empty() {
        return Err(NarratorError::InvalidResponse("Empty answer".to_string()));
    }
    Ok(answer)
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
