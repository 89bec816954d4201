//! Asynchronous conversation reviews for admin sessions.
//!
//! A review is a second model pass over the recent transcript that streams
//! to the same subscribers as the chat itself. Reviews are ephemeral: they
//! are never persisted, and a failed review emits nothing beyond the start
//! marker so the chat stream stays clean.

use chat_core::{extract_control_signal, ChatEvent, GenerationParams};
use database::session;
use futures::StreamExt;
use tracing::{debug, error};

use crate::chat::ChatOrchestrator;
use crate::error::ChatError;
use crate::prompts;

const REVIEW_TEMPERATURE: f32 = 0.2;
const REVIEW_MAX_TOKENS: u32 = 120;

impl ChatOrchestrator {
    /// Spawn one review of `session_id` in the background.
    ///
    /// Reviews never block the turn that triggered them; failures are
    /// logged here and go no further.
    pub(crate) fn spawn_review(&self, session_id: &str) {
        let orchestrator = self.clone();
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = orchestrator.run_review(&session_id).await {
                error!(session_id, error = %err, "conversation review failed");
            }
        });
    }

    /// Run one conversation review and stream it to subscribers.
    pub(crate) async fn run_review(&self, session_id: &str) -> Result<(), ChatError> {
        let session = session::get_session(self.db.pool(), session_id).await?;
        let messages = prompts::build_review_messages(&self.db, &session).await?;
        let params = GenerationParams::new(&self.config.review_model)
            .with_temperature(REVIEW_TEMPERATURE)
            .with_max_tokens(REVIEW_MAX_TOKENS);

        self.events
            .broadcast(session_id, ChatEvent::ReviewStart)
            .await;

        let mut stream = self.gateway.complete_streaming(&messages, &params).await?;
        let mut content = String::new();
        while let Some(delta) = stream.next().await {
            let delta = delta?;
            if delta.is_empty() {
                continue;
            }
            content.push_str(&delta);
            self.events
                .broadcast(session_id, ChatEvent::ReviewChunk { content: delta })
                .await;
        }

        let (wrapping_up, cleaned) = extract_control_signal(&content);
        self.events
            .broadcast(session_id, ChatEvent::ReviewComplete { content: cleaned })
            .await;
        if let Some(wrapping_up) = wrapping_up {
            self.events
                .broadcast(session_id, ChatEvent::ReviewStatus { wrapping_up })
                .await;
        }
        debug!(session_id, ?wrapping_up, "conversation review delivered");
        Ok(())
    }
}
