//! Database models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One practice run of a scenario by a manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Session {
    /// UUID.
    pub id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Scenario being practiced.
    pub scenario_id: String,
    /// The human manager running the session.
    pub operator_id: String,
    /// Current phase: "setup", "role_play" or "debrief".
    pub phase: String,
    /// "active", "completed" or "abandoned".
    pub status: String,
    /// Role-play system prompt, frozen at creation.
    pub system_prompt: String,
    /// Per-session model override, if any.
    pub model: Option<String>,
    /// Ordinal of this session within (tenant, operator, scenario).
    pub session_number: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

/// One entry in a session's role-play transcript. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    /// UUID.
    pub id: String,
    pub session_id: String,
    /// "user", "assistant" or "system".
    pub role: String,
    pub content: String,
    /// Phase that was active when the message was created.
    pub phase: String,
    /// Token usage reported by the provider, when available.
    pub token_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// One entry in a session's post-hoc coaching conversation. Not phase-tagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CoachMessage {
    /// UUID.
    pub id: String,
    pub session_id: String,
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Static configuration for a practice scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Scenario {
    /// UUID.
    pub id: String,
    pub name: String,
    pub description: String,
    /// Free-text character and behavior notes for the simulated counterpart.
    pub llm_instructions: String,
    pub recommended_for: String,
    pub category: String,
    /// Target duration of the role play.
    pub duration_minutes: i64,
    pub active: bool,
    /// Per-scenario model override, if any.
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A coaching-reference corpus entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct KnowledgeItem {
    /// UUID.
    pub id: String,
    pub title: String,
    pub content: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Keyed system-prompt template text, editable without a deploy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PromptTemplate {
    pub key: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}
