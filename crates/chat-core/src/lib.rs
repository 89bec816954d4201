//! Core traits and types for the practice-session chat orchestration.
//!
//! This crate is the shared contract between the orchestration core, the
//! model gateway implementations, and the serving layer. It defines:
//!
//! - [`Phase`] - The three sequential conversation phases of a session
//! - [`ModelGateway`] - The trait every model backend must implement
//! - [`ChatEvent`] / [`ClientAction`] - The outbound/inbound wire protocol
//! - [`MessagePayload`] - The message shape carried by events
//! - [`extract_control_signal`] - Trailing `{"wrapping_up": bool}` detection
//! - [`GatewayError`] - Error type for gateway operations
//!
//! # Example
//!
//! ```rust
//! use chat_core::{
//!     async_trait, Completion, DeltaStream, GatewayError, GenerationParams, ModelGateway,
//!     PromptMessage,
//! };
//! use futures::stream;
//!
//! struct CannedGateway;
//!
//! #[async_trait]
//! impl ModelGateway for CannedGateway {
//!     async fn complete(
//!         &self,
//!         _messages: &[PromptMessage],
//!         _params: &GenerationParams,
//!     ) -> Result<Completion, GatewayError> {
//!         Ok(Completion::new("Hello!"))
//!     }
//!
//!     async fn complete_streaming(
//!         &self,
//!         _messages: &[PromptMessage],
//!         _params: &GenerationParams,
//!     ) -> Result<DeltaStream, GatewayError> {
//!         let chunks = stream::once(async { Ok::<String, GatewayError>("Hello!".into()) });
//!         Ok(Box::pin(chunks))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "canned"
//!     }
//! }
//! ```

mod control;
mod error;
mod event;
mod gateway;
mod message;
mod phase;

pub use control::{extract_control_signal, WRAPPING_UP_KEY};
pub use error::GatewayError;
pub use event::{ChatEvent, ClientAction};
pub use gateway::{Completion, DeltaStream, GenerationParams, ModelGateway};
pub use message::{MessagePayload, PromptMessage, Role};
pub use phase::Phase;

// Re-export async_trait for convenience
pub use async_trait::async_trait;
