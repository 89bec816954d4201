//! Configuration for the OpenAI gateway.

use std::env;
use std::time::Duration;

use chat_core::GatewayError;

/// Retry policy for non-streaming completion calls.
///
/// Streaming calls are never resumed mid-flight; this applies only to the
/// initial request of `complete`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier for each retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: Some(2),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Calculate delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }

    /// Check if we should retry after the given number of attempts.
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.max_retries.map_or(true, |max| attempts < max)
    }
}

/// Configuration for [`OpenAiGateway`](crate::OpenAiGateway).
#[derive(Debug, Clone)]
pub struct OpenAiGatewayConfig {
    /// Provider base URL.
    pub api_url: String,

    /// API key for authentication.
    pub api_key: String,

    /// Default model for sessions that do not pin one.
    pub default_model: String,

    /// Total request timeout for non-streaming completions.
    pub request_timeout: Duration,

    /// Connect timeout for streaming completions (the body is unbounded).
    pub connect_timeout: Duration,

    /// Retry policy for non-streaming completions.
    pub retry: RetryPolicy,
}

impl Default for OpenAiGatewayConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            default_model: "gpt-4o".to_string(),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

impl OpenAiGatewayConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `OPENAI_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `OPENAI_API_URL` - Provider base URL (default: https://api.openai.com)
    /// - `OPENAI_MODEL` - Default model (default: gpt-4o)
    /// - `OPENAI_TIMEOUT_SECS` - Request timeout in seconds (default: 60)
    /// - `OPENAI_MAX_RETRIES` - Retries for non-streaming calls (default: 2)
    pub fn from_env() -> Result<Self, GatewayError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| GatewayError::Configuration("OPENAI_API_KEY not set".to_string()))?;

        let api_url =
            env::var("OPENAI_API_URL").unwrap_or_else(|_| "https://api.openai.com".to_string());

        let default_model = env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let request_timeout = env::var("OPENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        let max_retries = env::var("OPENAI_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);

        Ok(Self {
            api_url,
            api_key,
            default_model,
            request_timeout,
            retry: RetryPolicy {
                max_retries: Some(max_retries),
                ..RetryPolicy::default()
            },
            ..Self::default()
        })
    }

    /// Create a new config builder.
    pub fn builder() -> OpenAiGatewayConfigBuilder {
        OpenAiGatewayConfigBuilder::default()
    }
}

/// Builder for [`OpenAiGatewayConfig`].
#[derive(Debug, Default)]
pub struct OpenAiGatewayConfigBuilder {
    config: OpenAiGatewayConfig,
}

impl OpenAiGatewayConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set the provider base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the default model.
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into();
        self
    }

    /// Set the non-streaming request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> OpenAiGatewayConfig {
        self.config
    }
}
