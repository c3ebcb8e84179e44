//! Ordered narrator providers ending in the mock.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::NarratorConfig;
use super::{
    ChatNarrator, MockNarrator, NarratorError, NarratorPort, NarratorRequest, NarratorResponse,
    MOCK_PROVIDER,
};

/// Tries each provider in turn, each bounded by `timeout`, and falls back
/// to the mock. Never fails.
#[derive(Clone)]
pub struct NarratorChain {
    providers: Vec<Arc<dyn NarratorPort>>,
    mock: MockNarrator,
    timeout: Duration,
}

impl NarratorChain {
    /// Chain over explicit providers.
    pub fn new(providers: Vec<Arc<dyn NarratorPort>>, timeout: Duration) -> Self {
        Self { providers, mock: MockNarrator, timeout }
    }

    /// Chain over the configured chat endpoints.
    pub fn from_config(config: &NarratorConfig) -> Self {
        let providers = config.endpoints()
            .into_iter()
            .map(|endpoint| Arc::new(ChatNarrator::new(endpoint, config.timeout)) as Arc<dyn NarratorPort>)
            .collect();
        Self::new(providers, config.timeout)
    }

    /// Only the mock.
    pub fn mock_only() -> Self {
        Self::new(Vec::new(), Duration::from_secs(1))
    }

    /// Provider names in default order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Providers to try for `preference`: a named provider moves to the
    /// front, `mock` skips them all.
    fn ordered(&self, preference: Option<&str>) -> Vec<Arc<dyn NarratorPort>> {
        match preference.map(str::trim) {
            None | Some("") | Some("auto") => self.providers.clone(),
            Some(p) if p.eq_ignore_ascii_case(MOCK_PROVIDER) => Vec::new(),
            Some(name) => {
                let (mut first, rest): (Vec<_>, Vec<_>) = self.providers.iter()
                    .cloned()
                    .partition(|p| p.name().eq_ignore_ascii_case(name));
                first.extend(rest);
                first
            }
        }
    }

    /// Answer a request.
    pub async fn ask(&self, request: &NarratorRequest) -> NarratorResponse {
        let context = request.game_context.as_ref();

        for provider in self.ordered(request.provider_preference.as_deref()) {
            let attempt = tokio::time::timeout(self.timeout, provider.ask(&request.question, context)).await;
            let result = attempt.unwrap_or(Err(NarratorError::Timeout(self.timeout)));

            match result {
                Ok(answer) => {
                    debug!("Narrator {} answered", provider.name());
                    return NarratorResponse { answer, provider: provider.name().to_string() };
                }
                Err(e) => warn!("Narrator {} failed, falling back: {}", provider.name(), e),
            }
        }

        NarratorResponse {
            answer: self.mock.answer(&request.question, context),
            provider: MOCK_PROVIDER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::game::context::NarratorContext;

    struct Fixed(&'static str, Result<&'static str, NarratorError>);

    #[async_trait]
    impl NarratorPort for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn ask(&self, _q: &str, _c: Option<&NarratorContext>) -> Result<String, NarratorError> {
            self.1.clone().map(str::to_string)
        }
    }

    struct Slow;

    #[async_trait]
    impl NarratorPort for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn ask(&self, _q: &str, _c: Option<&NarratorContext>) -> Result<String, NarratorError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    fn request(pref: Option<&str>) -> NarratorRequest {
        NarratorRequest {
            question: "tell me the rules".into(),
            game_context: None,
            provider_preference: pref.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_first_healthy_provider_answers() {
        let chain = NarratorChain::new(vec![
            Arc::new(Fixed("primary", Err(NarratorError::RequestFailed("500".into())))),
            Arc::new(Fixed("secondary", Ok("Wolves hunt at night."))),
        ], Duration::from_secs(1));

        let response = chain.ask(&request(None)).await;
        assert_eq!(response.provider, "secondary");
        assert_eq!(response.answer, "Wolves hunt at night.");
    }

    #[tokio::test]
    async fn test_preference_moves_provider_first() {
        let chain = NarratorChain::new(vec![
            Arc::new(Fixed("primary", Ok("a"))),
            Arc::new(Fixed("secondary", Ok("b"))),
        ], Duration::from_secs(1));

        assert_eq!(chain.ask(&request(Some("secondary"))).await.provider, "secondary");
        assert_eq!(chain.ask(&request(Some("auto"))).await.provider, "primary");
        assert_eq!(chain.ask(&request(Some("mock"))).await.provider, "mock");
    }

    #[tokio::test]
    async fn test_all_fail_falls_back_to_mock() {
        let chain = NarratorChain::new(vec![
            Arc::new(Fixed("primary", Err(NarratorError::NotConfigured("key".into())))),
        ], Duration::from_secs(1));

        let response = chain.ask(&request(None)).await;
        assert_eq!(response.provider, "mock");
        assert!(response.answer.starts_with("Basic rules"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let chain = NarratorChain::new(vec![Arc::new(Slow)], Duration::from_millis(100));
        let response = chain.ask(&request(None)).await;
        assert_eq!(response.provider, "mock");
    }

    #[test]
    fn test_from_config_without_endpoints() {
        let chain = NarratorChain::from_config(&NarratorConfig::default());
        assert!(chain.provider_names().is_empty());
    }
}
