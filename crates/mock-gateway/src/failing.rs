//! Failing gateway - fails every call with a fixed error.

use async_trait::async_trait;
use chat_core::{
    Completion, DeltaStream, GatewayError, GenerationParams, ModelGateway, PromptMessage,
};

enum FailureKind {
    Network(String),
    Api { status: u16, message: String },
}

/// A gateway where every call fails.
///
/// Useful for exercising fallback and error-event paths without scripting
/// each call individually.
pub struct FailingGateway {
    kind: FailureKind,
}

impl FailingGateway {
    /// Fail every call with a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Network(message.into()),
        }
    }

    /// Fail every call with an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Api {
                status,
                message: message.into(),
            },
        }
    }

    fn error(&self) -> GatewayError {
        match &self.kind {
            FailureKind::Network(message) => GatewayError::Network(message.clone()),
            FailureKind::Api { status, message } => GatewayError::Api {
                status: *status,
                message: message.clone(),
            },
        }
    }
}

#[async_trait]
impl ModelGateway for FailingGateway {
    async fn complete(
        &self,
        _messages: &[PromptMessage],
        _params: &GenerationParams,
    ) -> Result<Completion, GatewayError> {
        Err(self.error())
    }

    async fn complete_streaming(
        &self,
        _messages: &[PromptMessage],
        _params: &GenerationParams,
    ) -> Result<DeltaStream, GatewayError> {
        Err(self.error())
    }

    fn name(&self) -> &str {
        "failing"
    }
}
