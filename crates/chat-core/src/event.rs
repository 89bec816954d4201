//! The wire protocol between the orchestration core and connected clients.

use serde::{Deserialize, Serialize};

use crate::message::MessagePayload;
use crate::phase::Phase;

/// Events broadcast to every subscriber of a session.
///
/// This is a closed union: clients can rely on no other event shapes
/// appearing on the stream. The `review_*` events arrive on the same stream
/// as the chat events but belong to the asynchronous review side-channel,
/// so their ordering relative to `assistant_*` events is not guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    UserMessage {
        message: MessagePayload,
    },
    AssistantStart,
    AssistantChunk {
        content: String,
    },
    AssistantComplete {
        message: MessagePayload,
        #[serde(skip_serializing_if = "Option::is_none")]
        wrapping_up: Option<bool>,
    },
    PhaseChanged {
        phase: Phase,
    },
    /// Always a generic user-safe string, never the underlying failure.
    Error {
        message: String,
    },
    ReviewStart,
    ReviewChunk {
        content: String,
    },
    ReviewComplete {
        content: String,
    },
    ReviewStatus {
        wrapping_up: bool,
    },
}

/// Actions a connected client may perform against its session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    SendMessage { content: String },
    TransitionPhase { phase: Phase },
    StartConversation,
}
