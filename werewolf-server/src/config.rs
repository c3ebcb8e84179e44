//! Server Configuration
//!
//! Every setting has a default; `from_env` overrides them from `WEREWOLF_*`
//! variables. Values that fail to parse keep the default and log a warning.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;

/// Default HTTP bind address.
pub const DEFAULT_HTTP_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 3000);
/// Default WebSocket bind address.
pub const DEFAULT_WS_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 3001);

// =============================================================================
// REGISTRY
// =============================================================================

/// Room registry limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Rooms idle longer than this are deleted.
    pub idle_timeout: Duration,
    /// How often the sweep runs.
    pub sweep_interval: Duration,
    /// Maximum live rooms.
    pub max_rooms: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(4 * 60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            max_rooms: 10_000,
        }
    }
}

// =============================================================================
// NARRATOR
// =============================================================================

/// One OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmEndpoint {
    /// Provider name reported in responses.
    pub name: String,
    /// Base URL; `/v1/chat/completions` is appended.
    pub url: String,
    /// Bearer token.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
}

/// Narrator providers, in default preference order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarratorConfig {
    /// Tried first.
    pub primary: Option<LlmEndpoint>,
    /// Tried second.
    pub secondary: Option<LlmEndpoint>,
    /// Bound on each provider call.
    pub timeout: Duration,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            primary: None,
            secondary: None,
            timeout: Duration::from_millis(8000),
        }
    }
}

impl NarratorConfig {
    /// Configured endpoints in preference order.
    pub fn endpoints(&self) -> Vec<LlmEndpoint> {
        self.primary.iter().chain(self.secondary.iter()).cloned().collect()
    }
}

/// Text-to-speech provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechConfig {
    /// Synthesis endpoint; speech is disabled without one.
    pub url: Option<String>,
    /// Bearer token.
    pub api_key: Option<String>,
    /// Default voice.
    pub voice: String,
    /// Request bound.
    pub timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            voice: "narrator".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

// =============================================================================
// SERVER
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// HTTP bind address.
    pub http_addr: SocketAddr,
    /// WebSocket bind address; `None` disables the push channel.
    pub ws_addr: Option<SocketAddr>,
    /// Registry limits.
    pub registry: RegistryConfig,
    /// Narrator providers.
    pub narrator: NarratorConfig,
    /// Speech provider.
    pub speech: SpeechConfig,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(DEFAULT_HTTP_ADDR),
            ws_addr: Some(SocketAddr::from(DEFAULT_WS_ADDR)),
            registry: RegistryConfig::default(),
            narrator: NarratorConfig::default(),
            speech: SpeechConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let http_addr = parse_or(get("WEREWOLF_HTTP_ADDR"), "WEREWOLF_HTTP_ADDR", defaults.http_addr);
        let ws_addr = match get("WEREWOLF_WS_ADDR") {
            Some(v) if v.eq_ignore_ascii_case("off") => None,
            other => Some(parse_or(other, "WEREWOLF_WS_ADDR", SocketAddr::from(DEFAULT_WS_ADDR))),
        };

        let registry = RegistryConfig {
            idle_timeout: Duration::from_secs(parse_or(
                get("WEREWOLF_ROOM_IDLE_SECS"),
                "WEREWOLF_ROOM_IDLE_SECS",
                defaults.registry.idle_timeout.as_secs(),
            )),
            sweep_interval: Duration::from_secs(parse_or(
                get("WEREWOLF_SWEEP_INTERVAL_SECS"),
                "WEREWOLF_SWEEP_INTERVAL_SECS",
                defaults.registry.sweep_interval.as_secs(),
            ).max(1)),
            max_rooms: parse_or(get("WEREWOLF_MAX_ROOMS"), "WEREWOLF_MAX_ROOMS", defaults.registry.max_rooms),
        };

        let endpoint = |slot: &str| {
            let url = get(&format!("WEREWOLF_LLM_{}_URL", slot))?;
            Some(LlmEndpoint {
                name: slot.to_ascii_lowercase(),
                url,
                api_key: get(&format!("WEREWOLF_LLM_{}_KEY", slot)),
                model: get(&format!("WEREWOLF_LLM_{}_MODEL", slot)).unwrap_or_else(|| "default".to_string()),
            })
        };

        let narrator = NarratorConfig {
            primary: endpoint("PRIMARY"),
            secondary: endpoint("SECONDARY"),
            timeout: Duration::from_millis(parse_or(
                get("WEREWOLF_NARRATOR_TIMEOUT_MS"),
                "WEREWOLF_NARRATOR_TIMEOUT_MS",
                defaults.narrator.timeout.as_millis() as u64,
            )),
        };

        let speech = SpeechConfig {
            url: get("WEREWOLF_TTS_URL"),
            api_key: get("WEREWOLF_TTS_KEY"),
            voice: get("WEREWOLF_TTS_VOICE").unwrap_or(defaults.speech.voice),
            timeout: defaults.speech.timeout,
        };

        Self {
            http_addr,
            ws_addr,
            registry,
            narrator,
            speech,
            version: defaults.version,
        }
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> T {
    match raw {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!("Invalid value {:?} for {}, using default", value, key);
            default
        }),
    }
}
