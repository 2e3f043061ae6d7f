use std::time::Duration;

use crate::errors::ClientError;
use crate::retry::RetryPolicy;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Configuration for the completion client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL for the OpenAI-compatible endpoint.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// Chat model name sent with every request.
    pub model: String,
    /// Connect timeout for each HTTP attempt.
    pub connect_timeout: Duration,
    /// Longest silence tolerated on an open stream before reconnecting.
    /// `None` waits indefinitely.
    pub idle_timeout: Option<Duration>,
    /// Reconnect behavior for retriable failures.
    pub retry: RetryPolicy,
}

impl ClientConfig {
    /// Creates a config with sensible defaults and a provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(60)),
            retry: RetryPolicy::default(),
        }
    }

    /// Builds a config from `OPENAI_API_KEY`, honoring optional
    /// `OPENAI_BASE_URL` and `OPENAI_MODEL` overrides.
    pub fn from_env() -> Result<Self, ClientError> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(ClientError::Config("missing OPENAI_API_KEY".into()));
        }
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config = config.base_url(base_url);
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL")
            && !model.trim().is_empty()
        {
            config = config.model(model);
        }
        Ok(config)
    }

    /// Overrides the API base URL (for proxies or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the chat model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the per-attempt connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the idle-read limit on open streams.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Overrides the reconnect policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub(crate) fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.api_key.trim().is_empty() {
            return Err(ClientError::Config("api_key must not be empty".into()));
        }
        if self.model.trim().is_empty() {
            return Err(ClientError::Config("model must not be empty".into()));
        }
        reqwest::Url::parse(&self.completions_url())
            .map_err(|e| ClientError::Config(format!("invalid base_url {}: {e}", self.base_url)))?;
        Ok(())
    }
}
