//! Phase-aware orchestration of leadership practice sessions.
//!
//! This crate provides the [`ChatOrchestrator`] type which coordinates
//! sessions between connected clients, the persistence layer, and a model
//! gateway.
//!
//! # Features
//!
//! - Runs each session through three forward-only phases (setup, role play,
//!   debrief), each with its own system prompt and sampling settings
//! - Streams replies token by token and fans them out to every subscriber
//! - Extracts the role-play wrap-up control signal before persisting
//! - Spawns asynchronous conversation reviews for admin sessions
//! - Hosts a post-session coaching conversation on a separate stream
//!
//! # Architecture
//!
//! ```text
//! Client action (send_message)
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CHAT ORCHESTRATOR                        │
//! │                                                              │
//! │  1. Validate (tenant, completed, blank) or drop              │
//! │         ↓                                                    │
//! │  2. Acquire the session's turn gate                          │
//! │         ↓                                                    │
//! │  3. Persist the user message, broadcast user_message         │
//! │     (admin + role play: spawn a conversation review)         │
//! │         ↓                                                    │
//! │  4. Build phase messages, stream the reply:                  │
//! │     assistant_start → assistant_chunk* → assistant_complete  │
//! │         ↓                                                    │
//! │  5. Strip the wrap-up signal (role play), persist the reply  │
//! │     (admin + role play: spawn a second review)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use orchestrator::{Caller, ChatOrchestrator, Database, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite:clary.db").await?;
//!     db.migrate().await?;
//!     let gateway = Arc::new(openai_gateway::OpenAiGateway::from_env()?);
//!     let orchestrator = ChatOrchestrator::new(db, gateway, OrchestratorConfig::default());
//!
//!     let caller = Caller {
//!         tenant_id: "acme".to_string(),
//!         operator_id: "manager-7".to_string(),
//!         admin: false,
//!     };
//!     let session = orchestrator.create_session(&caller, "scenario-id", None).await?;
//!     let mut events = orchestrator.subscribe(&caller, &session.id).await?;
//!
//!     orchestrator.send_message(&caller, &session.id, "I'm ready.").await?;
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

mod broadcast;
mod chat;
mod coach;
mod error;
mod phases;
mod prompts;
mod review;
#[cfg(test)]
mod testing;

// Public exports
pub use broadcast::EventBroadcaster;
pub use chat::{Caller, ChatOrchestrator, OrchestratorConfig};
pub use error::ChatError;
pub use phases::{opener, temperature, turn_params, Opener, DEBRIEF_OPENER};
pub use prompts::{
    CLARY_SOUL_KEY, COACHING_KEY, REVIEW_KEY, REVIEW_WINDOW, ROLE_PLAY_TEMPLATE_KEY,
    SETUP_INTRO_KEY,
};

// Re-export commonly used types from dependencies
pub use chat_core::{ChatEvent, ClientAction, Phase};
pub use database::Database;
