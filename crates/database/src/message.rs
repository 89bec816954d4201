//! Transcript persistence: role-play chat messages and coach messages.
//!
//! Both logs are append-only. Total order is creation time with the rowid as
//! a tie-break, so two messages written in the same millisecond still read
//! back in insert order.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ChatMessage, CoachMessage};

/// Fields required to append a chat message.
#[derive(Debug, Clone)]
pub struct NewChatMessage<'a> {
    pub session_id: &'a str,
    pub role: &'a str,
    pub content: &'a str,
    /// Phase active at creation, denormalized for later filtering.
    pub phase: &'a str,
    pub token_count: Option<i64>,
}

/// Append a message to a session's role-play transcript.
pub async fn append_chat_message(
    pool: &SqlitePool,
    new: &NewChatMessage<'_>,
) -> Result<ChatMessage> {
    let message = ChatMessage {
        id: Uuid::new_v4().to_string(),
        session_id: new.session_id.to_string(),
        role: new.role.to_string(),
        content: new.content.to_string(),
        phase: new.phase.to_string(),
        token_count: new.token_count,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO chat_messages (id, session_id, role, content, phase, token_count, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&message.id)
    .bind(&message.session_id)
    .bind(&message.role)
    .bind(&message.content)
    .bind(&message.phase)
    .bind(message.token_count)
    .bind(message.created_at)
    .execute(pool)
    .await?;

    Ok(message)
}

/// All chat messages of a session in creation order.
pub async fn list_chat_messages(pool: &SqlitePool, session_id: &str) -> Result<Vec<ChatMessage>> {
    let messages = sqlx::query_as::<_, ChatMessage>(
        r#"
        SELECT id, session_id, role, content, phase, token_count, created_at
        FROM chat_messages
        WHERE session_id = ?
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// Chat messages created during one phase, in creation order.
pub async fn chat_messages_for_phase(
    pool: &SqlitePool,
    session_id: &str,
    phase: &str,
) -> Result<Vec<ChatMessage>> {
    let messages = sqlx::query_as::<_, ChatMessage>(
        r#"
        SELECT id, session_id, role, content, phase, token_count, created_at
        FROM chat_messages
        WHERE session_id = ? AND phase = ?
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(session_id)
    .bind(phase)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// The most recent `limit` chat messages, returned oldest-first.
pub async fn recent_chat_messages(
    pool: &SqlitePool,
    session_id: &str,
    limit: i64,
) -> Result<Vec<ChatMessage>> {
    let mut messages = sqlx::query_as::<_, ChatMessage>(
        r#"
        SELECT id, session_id, role, content, phase, token_count, created_at
        FROM chat_messages
        WHERE session_id = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    messages.reverse();
    Ok(messages)
}

/// Number of chat messages created during one phase.
pub async fn phase_message_count(
    pool: &SqlitePool,
    session_id: &str,
    phase: &str,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM chat_messages
        WHERE session_id = ? AND phase = ?
        "#,
    )
    .bind(session_id)
    .bind(phase)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Total number of chat messages in a session.
pub async fn count_chat_messages(pool: &SqlitePool, session_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM chat_messages
        WHERE session_id = ?
        "#,
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Append a message to a session's coaching conversation.
pub async fn append_coach_message(
    pool: &SqlitePool,
    session_id: &str,
    role: &str,
    content: &str,
) -> Result<CoachMessage> {
    let message = CoachMessage {
        id: Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        role: role.to_string(),
        content: content.to_string(),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO coach_messages (id, session_id, role, content, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&message.id)
    .bind(&message.session_id)
    .bind(&message.role)
    .bind(&message.content)
    .bind(message.created_at)
    .execute(pool)
    .await?;

    Ok(message)
}

/// All coach messages of a session in creation order.
pub async fn list_coach_messages(pool: &SqlitePool, session_id: &str) -> Result<Vec<CoachMessage>> {
    let messages = sqlx::query_as::<_, CoachMessage>(
        r#"
        SELECT id, session_id, role, content, created_at
        FROM coach_messages
        WHERE session_id = ?
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// Number of coach messages in a session.
pub async fn count_coach_messages(pool: &SqlitePool, session_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM coach_messages
        WHERE session_id = ?
        "#,
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
