//! The model gateway contract the orchestration core depends on.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::message::PromptMessage;

/// A stream of text deltas from a streaming completion.
///
/// Deltas must be applied in order. A failed item ends the stream; callers
/// treat it as terminal for the current turn and never resume mid-stream.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, GatewayError>> + Send>>;

/// Sampling parameters for one completion call.
///
/// Only `model` is required; unset fields are omitted from the provider
/// request so the provider's own defaults apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
}

impl GenerationParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
            top_p: None,
            presence_penalty: None,
            frequency_penalty: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_presence_penalty(mut self, presence_penalty: f32) -> Self {
        self.presence_penalty = Some(presence_penalty);
        self
    }

    pub fn with_frequency_penalty(mut self, frequency_penalty: f32) -> Self {
        self.frequency_penalty = Some(frequency_penalty);
        self
    }
}

/// The result of a non-streaming completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub token_count: Option<u32>,
}

impl Completion {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            token_count: None,
        }
    }

    pub fn with_token_count(mut self, token_count: u32) -> Self {
        self.token_count = Some(token_count);
        self
    }
}

/// Contract every model backend implements.
///
/// Failures surface as a single [`GatewayError`] per call. The orchestration
/// core never retries; retry and backoff policy, if any, belongs to the
/// gateway implementation behind this trait.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Run a completion and return the full response text.
    async fn complete(
        &self,
        messages: &[PromptMessage],
        params: &GenerationParams,
    ) -> Result<Completion, GatewayError>;

    /// Run a completion and return a stream of text deltas.
    async fn complete_streaming(
        &self,
        messages: &[PromptMessage],
        params: &GenerationParams,
    ) -> Result<DeltaStream, GatewayError>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;
}
