//! Session persistence operations.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::Session;

/// Fields required to create a session.
#[derive(Debug, Clone)]
pub struct NewSession<'a> {
    pub tenant_id: &'a str,
    pub scenario_id: &'a str,
    pub operator_id: &'a str,
    /// Role-play system prompt, frozen for the life of the session.
    pub system_prompt: &'a str,
    pub model: Option<&'a str>,
}

/// Create a session in the setup phase.
///
/// `session_number` is assigned inside the insert as one past the number of
/// existing sessions for the same (tenant, operator, scenario) triple.
pub async fn create_session(pool: &SqlitePool, new: &NewSession<'_>) -> Result<Session> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO sessions
            (id, tenant_id, scenario_id, operator_id, phase, status,
             system_prompt, model, session_number, started_at, created_at)
        VALUES
            (?, ?, ?, ?, 'setup', 'active', ?, ?,
             (SELECT COUNT(*) + 1 FROM sessions
              WHERE tenant_id = ? AND operator_id = ? AND scenario_id = ?),
             ?, ?)
        "#,
    )
    .bind(&id)
    .bind(new.tenant_id)
    .bind(new.scenario_id)
    .bind(new.operator_id)
    .bind(new.system_prompt)
    .bind(new.model)
    .bind(new.tenant_id)
    .bind(new.operator_id)
    .bind(new.scenario_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_session(pool, &id).await
}

/// Get a session by ID.
pub async fn get_session(pool: &SqlitePool, id: &str) -> Result<Session> {
    sqlx::query_as::<_, Session>(
        r#"
        SELECT id, tenant_id, scenario_id, operator_id, phase, status,
               system_prompt, model, session_number, started_at, completed_at,
               duration_seconds, created_at
        FROM sessions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Session",
        id: id.to_string(),
    })
}

/// Persist a phase change.
pub async fn set_phase(pool: &SqlitePool, id: &str, phase: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET phase = ?
        WHERE id = ?
        "#,
    )
    .bind(phase)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Session",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Mark a session completed and record how long it ran.
pub async fn complete_session(
    pool: &SqlitePool,
    id: &str,
    completed_at: DateTime<Utc>,
    duration_seconds: i64,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET status = 'completed', completed_at = ?, duration_seconds = ?
        WHERE id = ?
        "#,
    )
    .bind(completed_at)
    .bind(duration_seconds)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Session",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// List a tenant's sessions, most recent first.
pub async fn list_sessions_for_tenant(pool: &SqlitePool, tenant_id: &str) -> Result<Vec<Session>> {
    let sessions = sqlx::query_as::<_, Session>(
        r#"
        SELECT id, tenant_id, scenario_id, operator_id, phase, status,
               system_prompt, model, session_number, started_at, completed_at,
               duration_seconds, created_at
        FROM sessions
        WHERE tenant_id = ?
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{self, NewScenario};
    use crate::Database;

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    async fn seed_scenario(pool: &SqlitePool) -> String {
        scenario::create_scenario(
            pool,
            &NewScenario {
                name: "Role clarity",
                description: "",
                llm_instructions: "",
                recommended_for: "",
                category: "Clarity",
                duration_minutes: 5,
                model: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn new_session<'a>(scenario_id: &'a str, operator_id: &'a str) -> NewSession<'a> {
        NewSession {
            tenant_id: "t1",
            scenario_id,
            operator_id,
            system_prompt: "frozen prompt",
            model: None,
        }
    }

    #[tokio::test]
    async fn test_session_numbers_increment_per_triple() {
        let db = test_db().await;
        let scenario_id = seed_scenario(db.pool()).await;

        let first = create_session(db.pool(), &new_session(&scenario_id, "op1"))
            .await
            .unwrap();
        let second = create_session(db.pool(), &new_session(&scenario_id, "op1"))
            .await
            .unwrap();
        let other_operator = create_session(db.pool(), &new_session(&scenario_id, "op2"))
            .await
            .unwrap();

        assert_eq!(first.session_number, 1);
        assert_eq!(second.session_number, 2);
        assert_eq!(other_operator.session_number, 1);
    }

    #[tokio::test]
    async fn test_complete_session_records_duration() {
        let db = test_db().await;
        let scenario_id = seed_scenario(db.pool()).await;
        let session = create_session(db.pool(), &new_session(&scenario_id, "op1"))
            .await
            .unwrap();

        complete_session(db.pool(), &session.id, Utc::now(), 312)
            .await
            .unwrap();

        let fetched = get_session(db.pool(), &session.id).await.unwrap();
        assert!(fetched.is_completed());
        assert_eq!(fetched.duration_seconds, Some(312));
        assert!(fetched.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_set_phase_on_missing_session() {
        let db = test_db().await;
        let result = set_phase(db.pool(), "missing", "role_play").await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_sessions_for_tenant_scoped() {
        let db = test_db().await;
        let scenario_id = seed_scenario(db.pool()).await;
        create_session(db.pool(), &new_session(&scenario_id, "op1"))
            .await
            .unwrap();
        create_session(
            db.pool(),
            &NewSession {
                tenant_id: "t2",
                scenario_id: &scenario_id,
                operator_id: "op9",
                system_prompt: "",
                model: None,
            },
        )
        .await
        .unwrap();

        let sessions = list_sessions_for_tenant(db.pool(), "t1").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].tenant_id, "t1");
    }
}
