//! `ModelGateway` implementation backed by the OpenAI chat-completions API.

use std::pin::Pin;
use std::task::{Context, Poll};

use chat_core::{
    async_trait, Completion, DeltaStream, GatewayError, GenerationParams, ModelGateway,
    PromptMessage,
};
use futures::stream::Stream;
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use tracing::{debug, error, warn};

use crate::api_types::{ApiError, ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse};
use crate::config::OpenAiGatewayConfig;

/// Gateway that talks to the OpenAI chat-completions endpoint.
pub struct OpenAiGateway {
    /// Client for blocking completions, with a full request timeout.
    client: reqwest::Client,
    /// Client for streamed completions. Streams are long-lived, so this one
    /// only bounds the connect phase.
    stream_client: reqwest::Client,
    config: OpenAiGatewayConfig,
}

impl OpenAiGateway {
    /// Create a gateway from the given configuration.
    pub fn new(config: OpenAiGatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let stream_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            stream_client,
            config,
        })
    }

    /// Create a gateway configured from environment variables.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::new(OpenAiGatewayConfig::from_env()?)
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.api_url)
    }

    fn build_request(
        &self,
        messages: &[PromptMessage],
        params: &GenerationParams,
        stream: bool,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: params.model.clone(),
            messages: messages.to_vec(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
            presence_penalty: params.presence_penalty,
            frequency_penalty: params.frequency_penalty,
            stream: stream.then_some(true),
        }
    }

    async fn try_complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<Completion, GatewayError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| GatewayError::Network(e.to_string()))?;
            let message = match serde_json::from_str::<ApiError>(&body) {
                Ok(api_error) => api_error.error.message,
                Err(_) => body,
            };
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Stream(format!("malformed completion response: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GatewayError::EmptyResponse)?;

        let mut completion = Completion::new(content);
        if let Some(usage) = body.usage {
            debug!(
                "Token usage - prompt: {}, completion: {}, total: {}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
            completion = completion.with_token_count(usage.completion_tokens);
        }
        Ok(completion)
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn complete(
        &self,
        messages: &[PromptMessage],
        params: &GenerationParams,
    ) -> Result<Completion, GatewayError> {
        let request = self.build_request(messages, params, false);
        let mut attempt = 0u32;

        loop {
            match self.try_complete(&request).await {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_retryable() && self.config.retry.should_retry(attempt) => {
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "completion request failed, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("completion request failed: {e}");
                    return Err(e);
                }
            }
        }
    }

    async fn complete_streaming(
        &self,
        messages: &[PromptMessage],
        params: &GenerationParams,
    ) -> Result<DeltaStream, GatewayError> {
        let request = self.build_request(messages, params, true);

        let source = self
            .stream_client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .eventsource()
            .map_err(|e| GatewayError::Stream(format!("failed to open event stream: {e}")))?;

        Ok(Box::pin(CompletionStream {
            source,
            done: false,
        }))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Adapts the SSE event stream into a stream of content deltas.
///
/// The completions endpoint terminates a stream with a `[DONE]` sentinel.
/// The underlying [`EventSource`] would otherwise reconnect when the server
/// closes the connection, so the source is closed as soon as the sentinel or
/// an error is seen.
struct CompletionStream {
    source: EventSource,
    done: bool,
}

impl Stream for CompletionStream {
    type Item = Result<String, GatewayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.source).poll_next(cx) {
                Poll::Ready(Some(Ok(Event::Open))) => {
                    debug!("completion stream opened");
                    continue;
                }
                Poll::Ready(Some(Ok(Event::Message(message)))) => {
                    if message.data == "[DONE]" {
                        self.done = true;
                        self.source.close();
                        return Poll::Ready(None);
                    }
                    match serde_json::from_str::<ChatCompletionChunk>(&message.data) {
                        Ok(chunk) => match chunk.delta_content() {
                            Some(content) => return Poll::Ready(Some(Ok(content.to_string()))),
                            // Role-only and finish-reason chunks carry no text.
                            None => continue,
                        },
                        Err(e) => {
                            warn!("failed to parse stream chunk: {e}");
                            self.done = true;
                            self.source.close();
                            return Poll::Ready(Some(Err(GatewayError::Stream(format!(
                                "malformed stream chunk: {e}"
                            )))));
                        }
                    }
                }
                Poll::Ready(Some(Err(reqwest_eventsource::Error::StreamEnded))) => {
                    self.done = true;
                    self.source.close();
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(Err(e))) => {
                    error!("completion stream error: {e}");
                    self.done = true;
                    self.source.close();
                    return Poll::Ready(Some(Err(map_stream_error(e))));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

fn map_stream_error(error: reqwest_eventsource::Error) -> GatewayError {
    match error {
        reqwest_eventsource::Error::InvalidStatusCode(status, _) => GatewayError::Api {
            status: status.as_u16(),
            message: "chat completion stream request rejected".to_string(),
        },
        reqwest_eventsource::Error::Transport(e) => GatewayError::Network(e.to_string()),
        other => GatewayError::Stream(other.to_string()),
    }
}
