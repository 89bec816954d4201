//! Mock model gateway implementations for testing.
//!
//! This crate provides mock implementations of the `ModelGateway` trait:
//! - `ScriptedGateway` - Plays back queued replies and records every call
//! - `FailingGateway` - Fails every call with a fixed error
//!
//! For production use, see the `openai-gateway` crate instead.
//!
//! # Example
//!
//! ```rust
//! use mock_gateway::{GenerationParams, ModelGateway, PromptMessage, ScriptedGateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_gateway::GatewayError> {
//!     let gateway = ScriptedGateway::new();
//!     gateway.enqueue_reply("Hi, thanks for making time today.");
//!
//!     let messages = vec![PromptMessage::user("Hello")];
//!     let params = GenerationParams::new("gpt-4o");
//!
//!     let completion = gateway.complete(&messages, &params).await?;
//!     assert_eq!(completion.content, "Hi, thanks for making time today.");
//!     assert_eq!(gateway.call_count(), 1);
//!     Ok(())
//! }
//! ```

mod failing;
mod scripted;

// Re-export chat-core types for convenience
pub use chat_core::{
    async_trait, Completion, DeltaStream, GatewayError, GenerationParams, ModelGateway,
    PromptMessage,
};

pub use failing::FailingGateway;
pub use scripted::{RecordedCall, ScriptedGateway};
