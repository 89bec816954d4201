//! Session lifecycle and chat socket routes.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use chat_core::{ChatEvent, ClientAction, MessagePayload};
use chrono::{DateTime, Utc};
use database::{ChatMessage, Session};
use futures::{SinkExt, StreamExt};
use orchestrator::Caller;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::routes::caller_from_headers;
use crate::state::AppState;

/// Request to create a session.
#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub scenario_id: String,
    /// Free-form notes about the manager, baked into the frozen role-play
    /// prompt.
    pub manager_context: Option<String>,
}

/// A session as returned to clients.
#[derive(Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub scenario_id: String,
    pub phase: String,
    pub status: String,
    pub model: Option<String>,
    pub session_number: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}

impl From<Session> for SessionInfo {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            scenario_id: session.scenario_id,
            phase: session.phase,
            status: session.status,
            model: session.model,
            session_number: session.session_number,
            started_at: session.started_at,
            completed_at: session.completed_at,
            duration_seconds: session.duration_seconds,
        }
    }
}

/// Create a session and seed its introduction.
pub async fn create_api(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<SessionInfo>> {
    let caller = caller_from_headers(&headers)?;
    let session = state
        .orchestrator
        .create_session(&caller, &req.scenario_id, req.manager_context.as_deref())
        .await?;
    Ok(Json(session.into()))
}

/// A session's full transcript.
pub async fn messages_api(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<MessagePayload>>> {
    let caller = caller_from_headers(&headers)?;
    let messages = state
        .orchestrator
        .session_messages(&caller, &session_id)
        .await?;
    Ok(Json(messages.into_iter().map(chat_payload).collect()))
}

/// Mark a session completed.
pub async fn complete_api(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SessionInfo>> {
    let caller = caller_from_headers(&headers)?;
    let session = state
        .orchestrator
        .complete_session(&caller, &session_id)
        .await?;
    Ok(Json(session.into()))
}

/// Upgrade to the chat socket: inbound client actions, outbound events.
pub async fn ws_api(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let caller = caller_from_headers(&headers)?;
    let events = state.orchestrator.subscribe(&caller, &session_id).await?;
    info!(session_id, operator_id = %caller.operator_id, "chat socket opened");
    Ok(ws.on_upgrade(move |socket| chat_socket(state, caller, session_id, events, socket)))
}

async fn chat_socket(
    state: AppState,
    caller: Caller,
    session_id: String,
    mut events: mpsc::Receiver<ChatEvent>,
    socket: WebSocket,
) {
    let (mut sink, mut frames) = socket.split();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            frame = frames.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        // Actions run detached so a streaming turn cannot
                        // stall this forward loop.
                        let state = state.clone();
                        let caller = caller.clone();
                        let session_id = session_id.clone();
                        tokio::spawn(async move {
                            dispatch_action(&state, &caller, &session_id, &text).await;
                        });
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(session_id, error = %err, "chat socket receive failed");
                        break;
                    }
                }
            }
        }
    }
    debug!(session_id, "chat socket closed");
}

/// Decode and run one client action. Malformed frames are ignored.
async fn dispatch_action(state: &AppState, caller: &Caller, session_id: &str, text: &str) {
    let action: ClientAction = match serde_json::from_str(text) {
        Ok(action) => action,
        Err(err) => {
            warn!(session_id, error = %err, "ignoring malformed client action");
            return;
        }
    };

    let result = match action {
        ClientAction::SendMessage { content } => {
            state
                .orchestrator
                .send_message(caller, session_id, &content)
                .await
        }
        ClientAction::TransitionPhase { phase } => {
            state
                .orchestrator
                .transition_phase(caller, session_id, phase)
                .await
        }
        ClientAction::StartConversation => {
            state
                .orchestrator
                .start_conversation(caller, session_id)
                .await
        }
    };
    if let Err(err) = result {
        error!(session_id, error = %err, "client action failed");
    }
}

pub(crate) fn chat_payload(message: ChatMessage) -> MessagePayload {
    MessagePayload {
        id: message.id,
        role: message.role,
        content: message.content,
        phase: Some(message.phase),
        created_at: message.created_at,
    }
}
