//! Scripted gateway - plays back queued replies and records calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chat_core::{
    Completion, DeltaStream, GatewayError, GenerationParams, ModelGateway, PromptMessage,
};
use futures::stream;

/// One recorded gateway call, captured for later assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Messages passed to the gateway.
    pub messages: Vec<PromptMessage>,
    /// Sampling parameters passed to the gateway.
    pub params: GenerationParams,
    /// Whether the call asked for a stream.
    pub streaming: bool,
}

enum ScriptedReply {
    Text(String),
    Failure(GatewayError),
    TextThenFailure { prefix: String, error: GatewayError },
}

/// A gateway that answers from a queue of scripted replies.
///
/// Replies are consumed front to back, one per call, regardless of whether
/// the call is blocking or streaming. Streamed replies are split into small
/// chunks so delta handling gets exercised. Every call is recorded.
#[derive(Clone)]
pub struct ScriptedGateway {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    chunk_size: usize,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGateway {
    /// Create a gateway with an empty script.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            chunk_size: 8,
        }
    }

    /// Set how many characters each streamed chunk carries.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Queue a reply for the next unanswered call.
    pub fn enqueue_reply(&self, text: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Text(text.into()));
    }

    /// Queue a failure for the next unanswered call.
    pub fn enqueue_failure(&self, error: GatewayError) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Failure(error));
    }

    /// Queue a streamed reply that yields `prefix` in chunks, then fails.
    ///
    /// A blocking call consuming this entry fails outright.
    pub fn enqueue_stream_failure(&self, prefix: impl Into<String>, error: GatewayError) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::TextThenFailure {
                prefix: prefix.into(),
                error,
            });
    }

    /// All calls recorded so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls recorded so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, messages: &[PromptMessage], params: &GenerationParams, streaming: bool) {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            params: params.clone(),
            streaming,
        });
    }

    fn next_reply(&self) -> Result<ScriptedReply, GatewayError> {
        self.replies.lock().unwrap().pop_front().ok_or_else(|| {
            GatewayError::Configuration("no scripted reply queued".to_string())
        })
    }

    fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(self.chunk_size)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn complete(
        &self,
        messages: &[PromptMessage],
        params: &GenerationParams,
    ) -> Result<Completion, GatewayError> {
        self.record(messages, params, false);
        match self.next_reply()? {
            ScriptedReply::Text(text) => Ok(Completion::new(text)),
            ScriptedReply::Failure(error) => Err(error),
            ScriptedReply::TextThenFailure { error, .. } => Err(error),
        }
    }

    async fn complete_streaming(
        &self,
        messages: &[PromptMessage],
        params: &GenerationParams,
    ) -> Result<DeltaStream, GatewayError> {
        self.record(messages, params, true);
        let items: Vec<Result<String, GatewayError>> = match self.next_reply()? {
            ScriptedReply::Text(text) => self.chunk(&text).into_iter().map(Ok).collect(),
            ScriptedReply::Failure(error) => return Err(error),
            ScriptedReply::TextThenFailure { prefix, error } => {
                let mut items: Vec<Result<String, GatewayError>> =
                    self.chunk(&prefix).into_iter().map(Ok).collect();
                items.push(Err(error));
                items
            }
        };
        Ok(Box::pin(stream::iter(items)))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn params() -> GenerationParams {
        GenerationParams::new("gpt-4o")
    }

    #[tokio::test]
    async fn test_replies_consumed_in_order() {
        let gateway = ScriptedGateway::new();
        gateway.enqueue_reply("first");
        gateway.enqueue_reply("second");

        let a = gateway.complete(&[PromptMessage::user("1")], &params()).await.unwrap();
        let b = gateway.complete(&[PromptMessage::user("2")], &params()).await.unwrap();
        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
    }

    #[tokio::test]
    async fn test_empty_script_is_a_loud_failure() {
        let gateway = ScriptedGateway::new();
        let result = gateway.complete(&[PromptMessage::user("hi")], &params()).await;
        assert!(matches!(result, Err(GatewayError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_streaming_chunks_reassemble() {
        let gateway = ScriptedGateway::new().with_chunk_size(4);
        gateway.enqueue_reply("Hello there, manager.");

        let mut stream = gateway
            .complete_streaming(&[PromptMessage::user("hi")], &params())
            .await
            .unwrap();

        let mut assembled = String::new();
        let mut chunks = 0;
        while let Some(delta) = stream.next().await {
            assembled.push_str(&delta.unwrap());
            chunks += 1;
        }
        assert_eq!(assembled, "Hello there, manager.");
        assert!(chunks > 1);
    }

    #[tokio::test]
    async fn test_stream_failure_yields_prefix_then_error() {
        let gateway = ScriptedGateway::new().with_chunk_size(4);
        gateway.enqueue_stream_failure("part", GatewayError::Network("reset".to_string()));

        let mut stream = gateway
            .complete_streaming(&[PromptMessage::user("hi")], &params())
            .await
            .unwrap();

        let first = stream.next().await.unwrap();
        assert_eq!(first.unwrap(), "part");
        let second = stream.next().await.unwrap();
        assert!(matches!(second, Err(GatewayError::Network(_))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_records_messages_and_params() {
        let gateway = ScriptedGateway::new();
        gateway.enqueue_reply("ok");

        let messages = vec![PromptMessage::system("sys"), PromptMessage::user("hi")];
        let params = GenerationParams::new("gpt-4o-mini").with_temperature(0.2);
        gateway.complete(&messages, &params).await.unwrap();

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].messages.len(), 2);
        assert_eq!(calls[0].params.model, "gpt-4o-mini");
        assert_eq!(calls[0].params.temperature, Some(0.2));
        assert!(!calls[0].streaming);
    }

    #[tokio::test]
    async fn test_clones_share_script_and_calls() {
        let gateway = ScriptedGateway::new();
        let clone = gateway.clone();
        gateway.enqueue_reply("shared");

        clone.complete(&[PromptMessage::user("hi")], &params()).await.unwrap();
        assert_eq!(gateway.call_count(), 1);
    }
}
