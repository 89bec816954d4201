//! Session lifecycle and phase-scoped turn handling.
//!
//! One [`ChatOrchestrator`] serves every session. Turns within a session are
//! serialized by a per-session gate; different sessions never contend.
//! Client mistakes (wrong tenant, completed session, blank content) are
//! logged and dropped rather than surfaced, because on a fan-out stream an
//! error event would reach every subscriber, not just the misbehaving one.

use std::collections::HashMap;
use std::sync::Arc;

use chat_core::{
    extract_control_signal, ChatEvent, GenerationParams, MessagePayload, ModelGateway, Phase,
    PromptMessage,
};
use chrono::Utc;
use database::message::{self, NewChatMessage};
use database::session::{self, NewSession};
use database::{scenario, ChatMessage, Database, Scenario, Session};
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use crate::broadcast::EventBroadcaster;
use crate::error::ChatError;
use crate::phases::{self, Opener};
use crate::prompts;

/// Sent to subscribers when generating a turn reply fails.
pub(crate) const TURN_ERROR_MESSAGE: &str =
    "Sorry, there was an error processing your message. Please try again.";

/// Model routing for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Used when a scenario does not pin a model.
    pub default_model: String,
    /// Model used for conversation reviews.
    pub review_model: String,
    /// Model used for post-session coaching.
    pub coach_model: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o".to_string(),
            review_model: "gpt-4o-mini".to_string(),
            coach_model: "gpt-4o".to_string(),
        }
    }
}

/// Identity of the client invoking an operation.
#[derive(Debug, Clone)]
pub struct Caller {
    pub tenant_id: String,
    pub operator_id: String,
    /// Admin turns additionally trigger conversation reviews.
    pub admin: bool,
}

/// Coordinates sessions, turns, phase openers, reviews and coaching.
///
/// Cheap to clone; clones share the broadcasters, the turn gates and the
/// database pool, so one instance can be handed to every connection handler
/// and every spawned review task.
#[derive(Clone)]
pub struct ChatOrchestrator {
    pub(crate) db: Database,
    pub(crate) gateway: Arc<dyn ModelGateway>,
    pub(crate) events: EventBroadcaster,
    pub(crate) coach_events: EventBroadcaster,
    turn_gates: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    pub(crate) config: OrchestratorConfig,
}

impl ChatOrchestrator {
    pub fn new(db: Database, gateway: Arc<dyn ModelGateway>, config: OrchestratorConfig) -> Self {
        Self {
            db,
            gateway,
            events: EventBroadcaster::new(),
            coach_events: EventBroadcaster::new(),
            turn_gates: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// The orchestrator's database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Subscribe to a session's event stream.
    pub async fn subscribe(
        &self,
        caller: &Caller,
        session_id: &str,
    ) -> Result<mpsc::Receiver<ChatEvent>, ChatError> {
        let session = session::get_session(self.db.pool(), session_id).await?;
        if session.tenant_id != caller.tenant_id {
            warn!(session_id, "subscribe rejected: tenant mismatch");
            return Err(ChatError::Unauthorized);
        }
        Ok(self.events.subscribe(session_id).await)
    }

    /// Create a session in the setup phase and seed Clary's introduction.
    ///
    /// The role-play system prompt is composed here and frozen on the
    /// session row; later template or scenario edits do not affect sessions
    /// already underway.
    pub async fn create_session(
        &self,
        caller: &Caller,
        scenario_id: &str,
        manager_context: Option<&str>,
    ) -> Result<Session, ChatError> {
        let scenario = scenario::get_scenario(self.db.pool(), scenario_id).await?;
        let system_prompt =
            prompts::build_role_play_prompt(&self.db, &scenario, manager_context).await?;
        let model = scenario
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());

        let session = session::create_session(
            self.db.pool(),
            &NewSession {
                tenant_id: &caller.tenant_id,
                scenario_id: &scenario.id,
                operator_id: &caller.operator_id,
                system_prompt: &system_prompt,
                model: Some(&model),
            },
        )
        .await?;

        info!(session_id = %session.id, scenario = %scenario.name, "session created");
        self.seed_setup_intro(&session, &scenario).await?;
        Ok(session)
    }

    /// Generate and persist the setup introduction if the setup phase is
    /// still empty.
    ///
    /// Runs synchronously and never broadcasts; callers fetch the message
    /// list right after. Generation failures fall back to deterministic
    /// text so a session always greets the manager.
    pub(crate) async fn seed_setup_intro(
        &self,
        session: &Session,
        scenario: &Scenario,
    ) -> Result<(), ChatError> {
        let existing =
            message::phase_message_count(self.db.pool(), &session.id, Phase::Setup.as_str())
                .await?;
        if existing > 0 {
            return Ok(());
        }

        let model = self.model_for(session);
        let (content, token_count) = match phases::opener(Phase::Setup, &model) {
            Opener::Streamed { seed, params } => {
                let system = prompts::setup_system_prompt(&self.db, session).await?;
                let messages = [PromptMessage::system(system), PromptMessage::user(seed)];
                match self.gateway.complete(&messages, &params).await {
                    Ok(completion) if !completion.content.trim().is_empty() => (
                        completion.content,
                        completion.token_count.map(i64::from),
                    ),
                    Ok(_) => {
                        warn!(session_id = %session.id, "empty setup introduction, using fallback");
                        (prompts::default_setup_intro(scenario), None)
                    }
                    Err(err) => {
                        error!(session_id = %session.id, error = %err, "setup introduction failed, using fallback");
                        (prompts::default_setup_intro(scenario), None)
                    }
                }
            }
            Opener::Static(text) => (text.to_string(), None),
        };

        message::append_chat_message(
            self.db.pool(),
            &NewChatMessage {
                session_id: &session.id,
                role: "assistant",
                content: &content,
                phase: Phase::Setup.as_str(),
                token_count,
            },
        )
        .await?;
        Ok(())
    }

    /// Handle one operator turn: persist the message, then stream the reply.
    ///
    /// Invalid sends are logged and dropped without an event. Failures
    /// while generating the reply reach subscribers as a single generic
    /// error event; nothing partial is persisted.
    pub async fn send_message(
        &self,
        caller: &Caller,
        session_id: &str,
        content: &str,
    ) -> Result<(), ChatError> {
        let session = session::get_session(self.db.pool(), session_id).await?;
        if session.tenant_id != caller.tenant_id {
            warn!(session_id, "message dropped: tenant mismatch");
            return Ok(());
        }
        if session.is_completed() {
            warn!(session_id, "message dropped: session completed");
            return Ok(());
        }
        let content = content.trim();
        if content.is_empty() {
            warn!(session_id, "message dropped: blank content");
            return Ok(());
        }

        let gate = self.turn_gate(session_id).await;
        let _turn = gate.lock().await;

        // Re-read inside the gate; a concurrent turn may have advanced the
        // session while this one waited.
        let session = session::get_session(self.db.pool(), session_id).await?;
        let Some(phase) = Phase::parse(&session.phase) else {
            warn!(session_id, phase = %session.phase, "message dropped: unknown phase");
            return Ok(());
        };

        let user_message = message::append_chat_message(
            self.db.pool(),
            &NewChatMessage {
                session_id: &session.id,
                role: "user",
                content,
                phase: phase.as_str(),
                token_count: None,
            },
        )
        .await?;
        self.events
            .broadcast(
                session_id,
                ChatEvent::UserMessage {
                    message: chat_payload(&user_message),
                },
            )
            .await;

        if caller.admin && phase == Phase::RolePlay {
            self.spawn_review(session_id);
        }

        if let Err(err) = self.run_model_turn(caller, &session, phase).await {
            error!(session_id, error = %err, "turn failed");
            self.events
                .broadcast(
                    session_id,
                    ChatEvent::Error {
                        message: TURN_ERROR_MESSAGE.to_string(),
                    },
                )
                .await;
        }
        Ok(())
    }

    async fn run_model_turn(
        &self,
        caller: &Caller,
        session: &Session,
        phase: Phase,
    ) -> Result<(), ChatError> {
        let messages = prompts::build_messages(&self.db, session, phase).await?;
        let params = phases::turn_params(phase, &self.model_for(session));

        self.events
            .broadcast(&session.id, ChatEvent::AssistantStart)
            .await;
        let content = self
            .stream_content(&self.events, &session.id, &messages, &params)
            .await?;

        // Only role-play replies carry the wrap-up control line.
        let (wrapping_up, cleaned) = if phase == Phase::RolePlay {
            extract_control_signal(&content)
        } else {
            (None, content)
        };

        let reply = message::append_chat_message(
            self.db.pool(),
            &NewChatMessage {
                session_id: &session.id,
                role: "assistant",
                content: &cleaned,
                phase: phase.as_str(),
                token_count: None,
            },
        )
        .await?;
        self.events
            .broadcast(
                &session.id,
                ChatEvent::AssistantComplete {
                    message: chat_payload(&reply),
                    wrapping_up,
                },
            )
            .await;

        if caller.admin && phase == Phase::RolePlay {
            self.spawn_review(&session.id);
        }
        Ok(())
    }

    /// Stream one completion, forwarding each delta, and return the full
    /// accumulated text.
    pub(crate) async fn stream_content(
        &self,
        events: &EventBroadcaster,
        session_id: &str,
        messages: &[PromptMessage],
        params: &GenerationParams,
    ) -> Result<String, ChatError> {
        let mut stream = self.gateway.complete_streaming(messages, params).await?;
        let mut content = String::new();
        while let Some(delta) = stream.next().await {
            let delta = delta?;
            content.push_str(&delta);
            events
                .broadcast(session_id, ChatEvent::AssistantChunk { content: delta })
                .await;
        }
        Ok(content)
    }

    /// Advance a session to `target` and open the new phase.
    ///
    /// Phases only move forward one step at a time; anything else is logged
    /// and dropped so a stale client cannot rewind a session.
    pub async fn transition_phase(
        &self,
        caller: &Caller,
        session_id: &str,
        target: Phase,
    ) -> Result<(), ChatError> {
        let session = session::get_session(self.db.pool(), session_id).await?;
        if session.tenant_id != caller.tenant_id {
            warn!(session_id, "transition dropped: tenant mismatch");
            return Ok(());
        }
        if session.is_completed() {
            warn!(session_id, "transition dropped: session completed");
            return Ok(());
        }

        let gate = self.turn_gate(session_id).await;
        let _turn = gate.lock().await;

        let session = session::get_session(self.db.pool(), session_id).await?;
        let Some(current) = Phase::parse(&session.phase) else {
            warn!(session_id, phase = %session.phase, "transition dropped: unknown phase");
            return Ok(());
        };
        if !current.can_advance_to(target) {
            warn!(
                session_id,
                from = current.as_str(),
                to = target.as_str(),
                "transition dropped: not a forward step"
            );
            return Ok(());
        }

        session::set_phase(self.db.pool(), session_id, target.as_str()).await?;
        info!(
            session_id,
            from = current.as_str(),
            to = target.as_str(),
            "phase advanced"
        );
        self.events
            .broadcast(session_id, ChatEvent::PhaseChanged { phase: target })
            .await;

        let session = session::get_session(self.db.pool(), session_id).await?;
        self.open_phase(&session, target).await
    }

    /// Produce the current phase's opener if the phase is still empty.
    ///
    /// Clients invoke this after connecting; repeated calls are no-ops once
    /// the opener exists.
    pub async fn start_conversation(
        &self,
        caller: &Caller,
        session_id: &str,
    ) -> Result<(), ChatError> {
        let session = session::get_session(self.db.pool(), session_id).await?;
        if session.tenant_id != caller.tenant_id {
            warn!(session_id, "start dropped: tenant mismatch");
            return Ok(());
        }
        if session.is_completed() {
            warn!(session_id, "start dropped: session completed");
            return Ok(());
        }

        let gate = self.turn_gate(session_id).await;
        let _turn = gate.lock().await;

        let session = session::get_session(self.db.pool(), session_id).await?;
        let Some(phase) = Phase::parse(&session.phase) else {
            warn!(session_id, phase = %session.phase, "start dropped: unknown phase");
            return Ok(());
        };
        self.open_phase(&session, phase).await
    }

    /// Produce the opener for `phase` unless it already has messages.
    async fn open_phase(&self, session: &Session, phase: Phase) -> Result<(), ChatError> {
        let existing =
            message::phase_message_count(self.db.pool(), &session.id, phase.as_str()).await?;
        if existing > 0 {
            return Ok(());
        }

        match phases::opener(phase, &self.model_for(session)) {
            Opener::Static(text) => {
                let message = message::append_chat_message(
                    self.db.pool(),
                    &NewChatMessage {
                        session_id: &session.id,
                        role: "assistant",
                        content: text,
                        phase: phase.as_str(),
                        token_count: None,
                    },
                )
                .await?;
                self.events
                    .broadcast(
                        &session.id,
                        ChatEvent::AssistantComplete {
                            message: chat_payload(&message),
                            wrapping_up: None,
                        },
                    )
                    .await;
                Ok(())
            }
            Opener::Streamed { seed, params } => {
                self.stream_opener(session, phase, seed, &params).await
            }
        }
    }

    /// Stream a generated phase opener, falling back to deterministic text
    /// when generation fails or comes back empty.
    async fn stream_opener(
        &self,
        session: &Session,
        phase: Phase,
        seed: &str,
        params: &GenerationParams,
    ) -> Result<(), ChatError> {
        let system = match phase {
            Phase::Setup => prompts::setup_system_prompt(&self.db, session).await?,
            _ => session.system_prompt.clone(),
        };
        let messages = [PromptMessage::system(system), PromptMessage::user(seed)];

        self.events
            .broadcast(&session.id, ChatEvent::AssistantStart)
            .await;
        let content = match self
            .stream_content(&self.events, &session.id, &messages, params)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(session_id = %session.id, phase = phase.as_str(), "empty opener, using fallback");
                self.fallback_opener(session, phase).await?
            }
            Err(err) => {
                error!(session_id = %session.id, phase = phase.as_str(), error = %err, "opener failed, using fallback");
                self.fallback_opener(session, phase).await?
            }
        };

        let message = message::append_chat_message(
            self.db.pool(),
            &NewChatMessage {
                session_id: &session.id,
                role: "assistant",
                content: &content,
                phase: phase.as_str(),
                token_count: None,
            },
        )
        .await?;
        self.events
            .broadcast(
                &session.id,
                ChatEvent::AssistantComplete {
                    message: chat_payload(&message),
                    wrapping_up: None,
                },
            )
            .await;
        Ok(())
    }

    async fn fallback_opener(&self, session: &Session, phase: Phase) -> Result<String, ChatError> {
        let scenario = scenario::get_scenario(self.db.pool(), &session.scenario_id).await?;
        Ok(match phase {
            Phase::Setup => prompts::default_setup_intro(&scenario),
            _ => prompts::default_role_play_intro(&scenario),
        })
    }

    /// Mark a session completed, recording how long it ran.
    ///
    /// Idempotent: completing an already-completed session returns it
    /// unchanged.
    pub async fn complete_session(
        &self,
        caller: &Caller,
        session_id: &str,
    ) -> Result<Session, ChatError> {
        let session = session::get_session(self.db.pool(), session_id).await?;
        if session.tenant_id != caller.tenant_id {
            warn!(session_id, "complete rejected: tenant mismatch");
            return Err(ChatError::Unauthorized);
        }
        if session.is_completed() {
            return Ok(session);
        }

        let now = Utc::now();
        let duration = (now - session.started_at).num_seconds();
        session::complete_session(self.db.pool(), session_id, now, duration).await?;
        self.turn_gates.lock().await.remove(session_id);
        info!(session_id, duration_seconds = duration, "session completed");
        session::get_session(self.db.pool(), session_id)
            .await
            .map_err(Into::into)
    }

    /// A session's full transcript.
    ///
    /// Seeds the setup introduction first when a fresh session is read
    /// before any client event arrives, so the first page load already
    /// shows Clary's greeting.
    pub async fn session_messages(
        &self,
        caller: &Caller,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let session = session::get_session(self.db.pool(), session_id).await?;
        if session.tenant_id != caller.tenant_id {
            warn!(session_id, "messages rejected: tenant mismatch");
            return Err(ChatError::Unauthorized);
        }
        if session.phase == Phase::Setup.as_str() {
            let scenario = scenario::get_scenario(self.db.pool(), &session.scenario_id).await?;
            self.seed_setup_intro(&session, &scenario).await?;
        }
        message::list_chat_messages(self.db.pool(), session_id)
            .await
            .map_err(Into::into)
    }

    /// The per-session gate serializing turns.
    async fn turn_gate(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut gates = self.turn_gates.lock().await;
        gates.entry(session_id.to_string()).or_default().clone()
    }

    pub(crate) fn model_for(&self, session: &Session) -> String {
        session
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone())
    }
}

pub(crate) fn chat_payload(message: &ChatMessage) -> MessagePayload {
    MessagePayload {
        id: message.id.clone(),
        role: message.role.clone(),
        content: message.content.clone(),
        phase: Some(message.phase.clone()),
        created_at: message.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::DEBRIEF_OPENER;
    use crate::testing::{caller, drain_now, harness};
    use chat_core::GatewayError;

    const INTRO: &str = "Welcome! Today we practice giving direct feedback.";

    #[tokio::test]
    async fn create_session_seeds_setup_intro() {
        let h = harness().await;
        h.gateway.enqueue_reply(INTRO);

        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, Some("Leads a team of six."))
            .await
            .unwrap();

        assert_eq!(session.phase, "setup");
        assert_eq!(session.model.as_deref(), Some("gpt-4o"));
        assert!(session.system_prompt.contains("Leads a team of six."));
        assert!(session.system_prompt.contains("CONVERSATION ENDING:"));

        let messages = message::list_chat_messages(h.db.pool(), &session.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "assistant");
        assert_eq!(messages[0].content, INTRO);
        assert_eq!(messages[0].phase, "setup");

        let calls = h.gateway.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].streaming);
        assert_eq!(calls[0].params.temperature, Some(0.8));
        assert_eq!(calls[0].params.max_tokens, Some(400));
        assert_eq!(
            calls[0].messages.last().unwrap().content,
            "Hello, I'm ready to learn about this scenario."
        );
    }

    #[tokio::test]
    async fn create_session_falls_back_when_intro_fails() {
        let h = harness().await;
        h.gateway
            .enqueue_failure(GatewayError::Network("connection reset".to_string()));

        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();

        let messages = message::list_chat_messages(h.db.pool(), &session.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("Missed deadlines"));
        assert!(messages[0].content.contains("5-minute role play"));
    }

    #[tokio::test]
    async fn create_session_falls_back_on_empty_intro() {
        let h = harness().await;
        h.gateway.enqueue_reply("   ");

        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();

        let messages = message::list_chat_messages(h.db.pool(), &session.id)
            .await
            .unwrap();
        assert!(messages[0].content.starts_with("Hi! I'm Clary"));
    }

    #[tokio::test]
    async fn send_message_streams_a_setup_turn() {
        let h = harness().await;
        h.gateway.enqueue_reply(INTRO);
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();
        let mut rx = h
            .orchestrator
            .subscribe(&caller(), &session.id)
            .await
            .unwrap();

        let reply = "Great question. You'll practice naming the missed deadlines directly.";
        h.gateway.enqueue_reply(reply);
        h.orchestrator
            .send_message(&caller(), &session.id, "What should I focus on?")
            .await
            .unwrap();

        let events = drain_now(&mut rx);
        match &events[0] {
            ChatEvent::UserMessage { message } => {
                assert_eq!(message.content, "What should I focus on?");
                assert_eq!(message.phase.as_deref(), Some("setup"));
            }
            other => panic!("expected user_message, got {other:?}"),
        }
        assert_eq!(events[1], ChatEvent::AssistantStart);

        let streamed: String = events
            .iter()
            .filter_map(|e| match e {
                ChatEvent::AssistantChunk { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(streamed, reply);

        match events.last().unwrap() {
            ChatEvent::AssistantComplete {
                message,
                wrapping_up,
            } => {
                assert_eq!(message.content, reply);
                assert_eq!(*wrapping_up, None);
            }
            other => panic!("expected assistant_complete, got {other:?}"),
        }

        let calls = h.gateway.calls();
        assert_eq!(calls.len(), 2);
        let turn = &calls[1];
        assert!(turn.streaming);
        assert_eq!(turn.params.model, "gpt-4o");
        assert_eq!(turn.params.temperature, Some(0.8));
        assert_eq!(turn.params.top_p, Some(0.9));
        assert_eq!(turn.params.presence_penalty, Some(0.2));
        assert_eq!(turn.params.frequency_penalty, Some(0.2));
        assert_eq!(turn.params.max_tokens, None);
        assert_eq!(
            turn.messages.last().unwrap().content,
            "What should I focus on?"
        );
    }

    #[tokio::test]
    async fn role_play_turn_extracts_wrap_signal() {
        let h = harness().await;
        h.gateway.enqueue_reply(INTRO);
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();
        h.gateway.enqueue_reply("Hi, thanks for making time.");
        h.orchestrator
            .transition_phase(&caller(), &session.id, Phase::RolePlay)
            .await
            .unwrap();

        let mut rx = h
            .orchestrator
            .subscribe(&caller(), &session.id)
            .await
            .unwrap();
        h.gateway
            .enqueue_reply("I think we're in a good place now. Thanks.\n{\"wrapping_up\": true}");
        h.orchestrator
            .send_message(&caller(), &session.id, "Anything else on your mind?")
            .await
            .unwrap();

        let events = drain_now(&mut rx);
        match events.last().unwrap() {
            ChatEvent::AssistantComplete {
                message,
                wrapping_up,
            } => {
                assert_eq!(message.content, "I think we're in a good place now. Thanks.");
                assert_eq!(*wrapping_up, Some(true));
            }
            other => panic!("expected assistant_complete, got {other:?}"),
        }

        let messages = message::list_chat_messages(h.db.pool(), &session.id)
            .await
            .unwrap();
        assert!(!messages.last().unwrap().content.contains("wrapping_up"));

        let turn = h.gateway.calls().into_iter().last().unwrap();
        assert_eq!(turn.params.temperature, Some(0.95));
        assert_eq!(turn.messages[0].content, session.system_prompt);
    }

    #[tokio::test]
    async fn transition_streams_role_play_opener() {
        let h = harness().await;
        h.gateway.enqueue_reply(INTRO);
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();
        let mut rx = h
            .orchestrator
            .subscribe(&caller(), &session.id)
            .await
            .unwrap();

        let opener = "Hi, thanks for making time. I wanted to talk about the deadlines.";
        h.gateway.enqueue_reply(opener);
        h.orchestrator
            .transition_phase(&caller(), &session.id, Phase::RolePlay)
            .await
            .unwrap();

        let events = drain_now(&mut rx);
        assert_eq!(
            events[0],
            ChatEvent::PhaseChanged {
                phase: Phase::RolePlay
            }
        );
        assert_eq!(events[1], ChatEvent::AssistantStart);
        match events.last().unwrap() {
            ChatEvent::AssistantComplete {
                message,
                wrapping_up,
            } => {
                assert_eq!(message.content, opener);
                assert_eq!(message.phase.as_deref(), Some("role_play"));
                assert_eq!(*wrapping_up, None);
            }
            other => panic!("expected assistant_complete, got {other:?}"),
        }

        let call = h.gateway.calls().into_iter().last().unwrap();
        assert_eq!(call.params.temperature, Some(0.95));
        assert_eq!(call.params.max_tokens, Some(280));
        assert_eq!(call.messages[0].content, session.system_prompt);
        assert_eq!(call.messages[1].content, "Hello");

        let session = session::get_session(h.db.pool(), &session.id).await.unwrap();
        assert_eq!(session.phase, "role_play");
    }

    #[tokio::test]
    async fn transition_to_debrief_inserts_static_opener() {
        let h = harness().await;
        h.gateway.enqueue_reply(INTRO);
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();
        h.gateway.enqueue_reply("Hi, thanks for making time.");
        h.orchestrator
            .transition_phase(&caller(), &session.id, Phase::RolePlay)
            .await
            .unwrap();

        let mut rx = h
            .orchestrator
            .subscribe(&caller(), &session.id)
            .await
            .unwrap();
        h.orchestrator
            .transition_phase(&caller(), &session.id, Phase::Debrief)
            .await
            .unwrap();

        let events = drain_now(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            ChatEvent::PhaseChanged {
                phase: Phase::Debrief
            }
        );
        match &events[1] {
            ChatEvent::AssistantComplete {
                message,
                wrapping_up,
            } => {
                assert_eq!(message.content, DEBRIEF_OPENER);
                assert_eq!(message.phase.as_deref(), Some("debrief"));
                assert_eq!(*wrapping_up, None);
            }
            other => panic!("expected assistant_complete, got {other:?}"),
        }

        // The debrief opener is canned; no model call happens.
        assert_eq!(h.gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn illegal_transitions_are_dropped() {
        let h = harness().await;
        h.gateway.enqueue_reply(INTRO);
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();

        h.orchestrator
            .transition_phase(&caller(), &session.id, Phase::Debrief)
            .await
            .unwrap();
        let current = session::get_session(h.db.pool(), &session.id).await.unwrap();
        assert_eq!(current.phase, "setup");

        h.gateway.enqueue_reply("Hi, thanks for making time.");
        h.orchestrator
            .transition_phase(&caller(), &session.id, Phase::RolePlay)
            .await
            .unwrap();
        h.orchestrator
            .transition_phase(&caller(), &session.id, Phase::Setup)
            .await
            .unwrap();
        let current = session::get_session(h.db.pool(), &session.id).await.unwrap();
        assert_eq!(current.phase, "role_play");
    }

    #[tokio::test]
    async fn send_message_drops_tenant_mismatch() {
        let h = harness().await;
        h.gateway.enqueue_reply(INTRO);
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
            .send_message(&intruder, &session.id, "hello?")
            .await
            .unwrap();

        let messages = message::list_chat_messages(h.db.pool(), &session.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(h.gateway.call_count(), 1);

        let subscribed = h.orchestrator.subscribe(&intruder, &session.id).await;
        assert!(matches!(subscribed, Err(ChatError::Unauthorized)));
    }

    #[tokio::test]
    async fn send_message_drops_blank_and_completed() {
        let h = harness().await;
        h.gateway.enqueue_reply(INTRO);
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();

        h.orchestrator
            .send_message(&caller(), &session.id, "  \n ")
            .await
            .unwrap();
        let messages = message::list_chat_messages(h.db.pool(), &session.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);

        h.orchestrator
            .complete_session(&caller(), &session.id)
            .await
            .unwrap();
        h.orchestrator
            .send_message(&caller(), &session.id, "still there?")
            .await
            .unwrap();
        let messages = message::list_chat_messages(h.db.pool(), &session.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(h.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn turn_failure_broadcasts_generic_error() {
        let h = harness().await;
        h.gateway.enqueue_reply(INTRO);
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();
        let mut rx = h
            .orchestrator
            .subscribe(&caller(), &session.id)
            .await
            .unwrap();

        h.gateway
            .enqueue_stream_failure("Sorry, I", GatewayError::Network("reset".to_string()));
        h.orchestrator
            .send_message(&caller(), &session.id, "Can you repeat that?")
            .await
            .unwrap();

        let events = drain_now(&mut rx);
        match events.last().unwrap() {
            ChatEvent::Error { message } => assert_eq!(message, TURN_ERROR_MESSAGE),
            other => panic!("expected error event, got {other:?}"),
        }
        assert!(events
            .iter()
            .any(|e| matches!(e, ChatEvent::AssistantChunk { .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, ChatEvent::AssistantComplete { .. })));

        // The user message persists; the partial reply does not.
        let messages = message::list_chat_messages(h.db.pool(), &session.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages.last().unwrap().role, "user");
    }

    #[tokio::test]
    async fn start_conversation_is_idempotent() {
        let h = harness().await;
        let session = session::create_session(
            h.db.pool(),
            &NewSession {
                tenant_id: "tenant-1",
                scenario_id: &h.scenario.id,
                operator_id: "manager-1",
                system_prompt: "Stay in character as Amira.",
                model: None,
            },
        )
        .await
        .unwrap();
        session::set_phase(h.db.pool(), &session.id, "role_play")
            .await
            .unwrap();

        h.gateway.enqueue_reply("Hi, thanks for making time.");
        h.orchestrator
            .start_conversation(&caller(), &session.id)
            .await
            .unwrap();

        let messages = message::list_chat_messages(h.db.pool(), &session.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Hi, thanks for making time.");
        assert_eq!(messages[0].phase, "role_play");

        let call = h.gateway.calls().into_iter().last().unwrap();
        assert_eq!(call.messages[0].content, "Stay in character as Amira.");

        h.orchestrator
            .start_conversation(&caller(), &session.id)
            .await
            .unwrap();
        let messages = message::list_chat_messages(h.db.pool(), &session.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(h.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn opener_failure_falls_back_to_deterministic_text() {
        let h = harness().await;
        h.gateway.enqueue_reply(INTRO);
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();
        let mut rx = h
            .orchestrator
            .subscribe(&caller(), &session.id)
            .await
            .unwrap();

        h.gateway
            .enqueue_failure(GatewayError::Api {
                status: 500,
                message: "overloaded".to_string(),
            });
        h.orchestrator
            .transition_phase(&caller(), &session.id, Phase::RolePlay)
            .await
            .unwrap();

        let events = drain_now(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, ChatEvent::Error { .. })));
        match events.last().unwrap() {
            ChatEvent::AssistantComplete { message, .. } => {
                assert!(message.content.starts_with("Hi, I'm ready to role-play"));
                assert!(message.content.contains("Missed deadlines"));
            }
            other => panic!("expected assistant_complete, got {other:?}"),
        }

        let messages = message::list_chat_messages(h.db.pool(), &session.id)
            .await
            .unwrap();
        assert_eq!(messages.last().unwrap().phase, "role_play");
    }

    #[tokio::test]
    async fn concurrent_sends_serialize() {
        let h = harness().await;
        h.gateway.enqueue_reply(INTRO);
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();

        h.gateway.enqueue_reply("First reply.");
        h.gateway.enqueue_reply("Second reply.");
        let c = caller();
        let (a, b) = tokio::join!(
            h.orchestrator.send_message(&c, &session.id, "one"),
            h.orchestrator.send_message(&c, &session.id, "two"),
        );
        a.unwrap();
        b.unwrap();

        let messages = message::list_chat_messages(h.db.pool(), &session.id)
            .await
            .unwrap();
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(
            roles,
            vec!["assistant", "user", "assistant", "user", "assistant"]
        );
    }

    #[tokio::test]
    async fn complete_session_is_idempotent() {
        let h = harness().await;
        h.gateway.enqueue_reply(INTRO);
        let session = h
            .orchestrator
            .create_session(&caller(), &h.scenario.id, None)
            .await
            .unwrap();

        let completed = h
            .orchestrator
            .complete_session(&caller(), &session.id)
            .await
            .unwrap();
        assert!(completed.is_completed());
        assert!(completed.completed_at.is_some());
        assert!(completed.duration_seconds.unwrap() >= 0);

        let again = h
            .orchestrator
            .complete_session(&caller(), &session.id)
            .await
            .unwrap();
        assert_eq!(again.completed_at, completed.completed_at);

        let intruder = Caller {
            tenant_id: "tenant-2".to_string(),
            operator_id: "manager-9".to_string(),
            admin: false,
        };
        let denied = h.orchestrator.complete_session(&intruder, &session.id).await;
        assert!(matches!(denied, Err(ChatError::Unauthorized)));
    }

    #[tokio::test]
    async fn session_messages_seeds_missing_intro() {
        let h = harness().await;
        let session = session::create_session(
            h.db.pool(),
            &NewSession {
                tenant_id: "tenant-1",
                scenario_id: &h.scenario.id,
                operator_id: "manager-1",
                system_prompt: "frozen",
                model: None,
            },
        )
        .await
        .unwrap();

        h.gateway.enqueue_reply(INTRO);
        let messages = h
            .orchestrator
            .session_messages(&caller(), &session.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, INTRO);

        let messages = h
            .orchestrator
            .session_messages(&caller(), &session.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(h.gateway.call_count(), 1);
    }
}
