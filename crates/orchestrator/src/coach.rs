//! Post-session coaching conversation.
//!
//! Coaching runs beside a session rather than inside it: its own message
//! table, its own event stream, no phases and no turn gate. It stays
//! available after the session completes, since reflecting on a finished
//! role play is the whole point.

use chat_core::{ChatEvent, GenerationParams, MessagePayload};
use database::{message, session, CoachMessage, Session};
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::chat::{Caller, ChatOrchestrator};
use crate::error::ChatError;
use crate::phases::DEBRIEF_OPENER;
use crate::prompts;

/// Sent to coach subscribers when generating a reply fails.
pub(crate) const COACH_ERROR_MESSAGE: &str = "There was an error. Please try again.";

const COACH_TEMPERATURE: f32 = 0.8;
const COACH_TOP_P: f32 = 0.9;
const COACH_PRESENCE_PENALTY: f32 = 0.1;
const COACH_FREQUENCY_PENALTY: f32 = 0.1;

impl ChatOrchestrator {
    /// Subscribe to a session's coaching event stream.
    pub async fn subscribe_coach(
        &self,
        caller: &Caller,
        session_id: &str,
    ) -> Result<mpsc::Receiver<ChatEvent>, ChatError> {
        let session = session::get_session(self.db.pool(), session_id).await?;
        if session.tenant_id != caller.tenant_id {
            warn!(session_id, "coach subscribe rejected: tenant mismatch");
            return Err(ChatError::Unauthorized);
        }
        Ok(self.coach_events.subscribe(session_id).await)
    }

    /// Insert the coach's opening question if the conversation is empty.
    /// Not broadcast; callers list messages right after.
    pub(crate) async fn ensure_coach_intro(&self, session_id: &str) -> Result<(), ChatError> {
        if message::count_coach_messages(self.db.pool(), session_id).await? > 0 {
            return Ok(());
        }
        message::append_coach_message(self.db.pool(), session_id, "assistant", DEBRIEF_OPENER)
            .await?;
        Ok(())
    }

    /// A session's coaching conversation, seeding the opening question on
    /// first read.
    pub async fn coach_messages(
        &self,
        caller: &Caller,
        session_id: &str,
    ) -> Result<Vec<CoachMessage>, ChatError> {
        let session = session::get_session(self.db.pool(), session_id).await?;
        if session.tenant_id != caller.tenant_id {
            warn!(session_id, "coach messages rejected: tenant mismatch");
            return Err(ChatError::Unauthorized);
        }
        self.ensure_coach_intro(session_id).await?;
        message::list_coach_messages(self.db.pool(), session_id)
            .await
            .map_err(Into::into)
    }

    /// Handle one coaching turn.
    pub async fn send_coach_message(
        &self,
        caller: &Caller,
        session_id: &str,
        content: &str,
    ) -> Result<(), ChatError> {
        let session = session::get_session(self.db.pool(), session_id).await?;
        if session.tenant_id != caller.tenant_id {
            warn!(session_id, "coach message dropped: tenant mismatch");
            return Ok(());
        }
        let content = content.trim();
        if content.is_empty() {
            warn!(session_id, "coach message dropped: blank content");
            return Ok(());
        }

        self.ensure_coach_intro(session_id).await?;
        let user_message =
            message::append_coach_message(self.db.pool(), session_id, "user", content).await?;
        self.coach_events
            .broadcast(
                session_id,
                ChatEvent::UserMessage {
                    message: coach_payload(&user_message),
                },
            )
            .await;

        if let Err(err) = self.run_coach_turn(&session).await {
            error!(session_id, error = %err, "coach turn failed");
            self.coach_events
                .broadcast(
                    session_id,
                    ChatEvent::Error {
                        message: COACH_ERROR_MESSAGE.to_string(),
                    },
                )
                .await;
        }
        Ok(())
    }

    async fn run_coach_turn(&self, session: &Session) -> Result<(), ChatError> {
        let messages = prompts::build_coach_messages(&self.db, session).await?;
        let params = GenerationParams::new(&self.config.coach_model)
            .with_temperature(COACH_TEMPERATURE)
            .with_top_p(COACH_TOP_P)
            .with_presence_penalty(COACH_PRESENCE_PENALTY)
            .with_frequency_penalty(COACH_FREQUENCY_PENALTY);

        self.coach_events
            .broadcast(&session.id, ChatEvent::AssistantStart)
            .await;
        let content = self
            .stream_content(&self.coach_events, &session.id, &messages, &params)
            .await?;

        let reply =
            message::append_coach_message(self.db.pool(), &session.id, "assistant", &content)
                .await?;
        self.coach_events
            .broadcast(
                &session.id,
                ChatEvent::AssistantComplete {
                    message: coach_payload(&reply),
                    wrapping_up: None,
                },
            )
            .await;
        Ok(())
    }
}

fn coach_payload(message: &CoachMessage) -> MessagePayload {
    MessagePayload {
        id: message.id.clone(),
        role: message.role.clone(),
        content: message.content.clone(),
        phase: None,
        created_at: message.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{caller, drain_now, harness};
    use chat_core::GatewayError;

    #[tokio::test]
    async fn coach_intro_is_inserted_once() {
        let h = harness().await;
        h.gateway.enqueue_reply("Welcome!");
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();

        let messages = h
            .orchestrator
            .coach_messages(&caller(), &session.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "assistant");
        assert_eq!(messages[0].content, DEBRIEF_OPENER);

        let messages = h
            .orchestrator
            .coach_messages(&caller(), &session.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn coach_turn_round_trip_on_a_completed_session() {
        let h = harness().await;
        h.gateway.enqueue_reply("Welcome!");
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();
        h.orchestrator
            .complete_session(&caller(), &session.id)
            .await
            .unwrap();

        let mut rx = h
            .orchestrator
            .subscribe_coach(&caller(), &session.id)
            .await
            .unwrap();
        let reply = "You named the problem early, like \"two missed deadlines\". Keep that.";
        h.gateway.enqueue_reply(reply);
        h.orchestrator
            .send_coach_message(&caller(), &session.id, "What could I have done better?")
            .await
            .unwrap();

        let events = drain_now(&mut rx);
        match &events[0] {
            ChatEvent::UserMessage { message } => {
                assert_eq!(message.content, "What could I have done better?");
                assert_eq!(message.phase, None);
            }
            other => panic!("expected user_message, got {other:?}"),
        }
        assert_eq!(events[1], ChatEvent::AssistantStart);
        match events.last().unwrap() {
            ChatEvent::AssistantComplete {
                message,
                wrapping_up,
            } => {
                assert_eq!(message.content, reply);
                assert_eq!(message.phase, None);
                assert_eq!(*wrapping_up, None);
            }
            other => panic!("expected assistant_complete, got {other:?}"),
        }

        let stored = h
            .orchestrator
            .coach_messages(&caller(), &session.id)
            .await
            .unwrap();
        let roles: Vec<&str> = stored.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["assistant", "user", "assistant"]);

        let call = h.gateway.calls().into_iter().last().unwrap();
        assert!(call.streaming);
        assert_eq!(call.params.model, "gpt-4o");
        assert_eq!(call.params.temperature, Some(0.8));
        assert_eq!(call.params.top_p, Some(0.9));
        assert_eq!(call.params.presence_penalty, Some(0.1));
        assert_eq!(call.params.frequency_penalty, Some(0.1));
        assert_eq!(call.params.max_tokens, None);
        assert!(call.messages[0].content.contains("expert leadership coach"));
        assert!(call.messages[1].content.starts_with("Transcript (full):"));
        assert_eq!(
            call.messages.last().unwrap().content,
            "What could I have done better?"
        );
    }

    #[tokio::test]
    async fn coach_failure_reports_generic_error() {
        let h = harness().await;
        h.gateway.enqueue_reply("Welcome!");
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();
        let mut rx = h
            .orchestrator
            .subscribe_coach(&caller(), &session.id)
            .await
            .unwrap();

        h.gateway
            .enqueue_failure(GatewayError::Network("reset".to_string()));
        h.orchestrator
            .send_coach_message(&caller(), &session.id, "Any advice?")
            .await
            .unwrap();

        let events = drain_now(&mut rx);
        match events.last().unwrap() {
            ChatEvent::Error { message } => assert_eq!(message, COACH_ERROR_MESSAGE),
            other => panic!("expected error event, got {other:?}"),
        }

        let stored = h
            .orchestrator
            .coach_messages(&caller(), &session.id)
            .await
            .unwrap();
        let roles: Vec<&str> = stored.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["assistant", "user"]);
    }

    #[tokio::test]
    async fn coach_drops_mismatched_tenant() {
        let h = harness().await;
        h.gateway.enqueue_reply("Welcome!");
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();

        let intruder = Caller {
            tenant_id: "tenant-2".to_string(),
            operator_id: "manager-9".to_string(),
            admin: false,
        };
        h.orchestrator
            .send_coach_message(&intruder, &session.id, "hello?")
            .await
            .unwrap();
        assert_eq!(
            message::count_coach_messages(h.db.pool(), &session.id)
                .await
                .unwrap(),
            0
        );

        let denied = h.orchestrator.subscribe_coach(&intruder, &session.id).await;
        assert!(matches!(denied, Err(ChatError::Unauthorized)));
        let denied = h.orchestrator.coach_messages(&intruder, &session.id).await;
        assert!(matches!(denied, Err(ChatError::Unauthorized)));
    }
}
