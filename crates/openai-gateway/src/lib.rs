//! OpenAI-compatible model gateway.
//!
//! Implements [`chat_core::ModelGateway`] against any provider that speaks
//! the `/v1/chat/completions` protocol: blocking completions with bounded
//! retry, and streaming completions consumed over SSE.
//!
//! # Example
//!
//! ```no_run
//! use chat_core::{GenerationParams, ModelGateway, PromptMessage};
//! use openai_gateway::{OpenAiGateway, OpenAiGatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OpenAiGatewayConfig::from_env()?;
//!     let gateway = OpenAiGateway::new(config)?;
//!
//!     let messages = vec![
//!         PromptMessage::system("You are a leadership coach."),
//!         PromptMessage::user("Hello"),
//!     ];
//!     let params = GenerationParams::new("gpt-4o").with_temperature(0.8);
//!
//!     let completion = gateway.complete(&messages, &params).await?;
//!     println!("{}", completion.content);
//!     Ok(())
//! }
//! ```

mod api_types;
mod config;
mod gateway;

pub use config::{OpenAiGatewayConfig, OpenAiGatewayConfigBuilder, RetryPolicy};
pub use gateway::OpenAiGateway;
