//! Post-session coaching routes.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use chat_core::{ChatEvent, ClientAction, MessagePayload};
use database::CoachMessage;
use futures::{SinkExt, StreamExt};
use orchestrator::Caller;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::routes::caller_from_headers;
use crate::state::AppState;

/// A session's coaching conversation.
pub async fn messages_api(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<MessagePayload>>> {
    let caller = caller_from_headers(&headers)?;
    let messages = state
        .orchestrator
        .coach_messages(&caller, &session_id)
        .await?;
    Ok(Json(messages.into_iter().map(coach_payload).collect()))
}

/// Upgrade to the coach socket. Only `send_message` actions apply here.
pub async fn ws_api(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let caller = caller_from_headers(&headers)?;
    let events = state
        .orchestrator
        .subscribe_coach(&caller, &session_id)
        .await?;
    info!(session_id, operator_id = %caller.operator_id, "coach socket opened");
    Ok(ws.on_upgrade(move |socket| coach_socket(state, caller, session_id, events, socket)))
}

async fn coach_socket(
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
                        let state = state.clone();
                        let caller = caller.clone();
                        let session_id = session_id.clone();
                        tokio::spawn(async move {
                            dispatch_coach_action(&state, &caller, &session_id, &text).await;
                        });
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(session_id, error = %err, "coach socket receive failed");
                        break;
                    }
                }
            }
        }
    }
    debug!(session_id, "coach socket closed");
}

/// Decode and run one coach action. Anything but `send_message` is ignored.
async fn dispatch_coach_action(state: &AppState, caller: &Caller, session_id: &str, text: &str) {
    let action: ClientAction = match serde_json::from_str(text) {
        Ok(action) => action,
        Err(err) => {
            warn!(session_id, error = %err, "ignoring malformed coach action");
            return;
        }
    };

    let ClientAction::SendMessage { content } = action else {
        warn!(session_id, "ignoring unsupported coach action");
        return;
    };
    if let Err(err) = state
        .orchestrator
        .send_coach_message(caller, session_id, &content)
        .await
    {
        error!(session_id, error = %err, "coach action failed");
    }
}

fn coach_payload(message: CoachMessage) -> MessagePayload {
    MessagePayload {
        id: message.id,
        role: message.role,
        content: message.content,
        phase: None,
        created_at: message.created_at,
    }
}
