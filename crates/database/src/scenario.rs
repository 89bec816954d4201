//! Scenario persistence operations.
//!
//! Scenarios are configured outside this system; the core only reads them.
//! `create_scenario` exists for bootstrap and tests.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::Scenario;

/// Fields required to create a scenario.
#[derive(Debug, Clone)]
pub struct NewScenario<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub llm_instructions: &'a str,
    pub recommended_for: &'a str,
    pub category: &'a str,
    pub duration_minutes: i64,
    pub model: Option<&'a str>,
}

/// Create an active scenario.
pub async fn create_scenario(pool: &SqlitePool, new: &NewScenario<'_>) -> Result<Scenario> {
    let scenario = Scenario {
        id: Uuid::new_v4().to_string(),
        name: new.name.to_string(),
        description: new.description.to_string(),
        llm_instructions: new.llm_instructions.to_string(),
        recommended_for: new.recommended_for.to_string(),
        category: new.category.to_string(),
        duration_minutes: new.duration_minutes,
        active: true,
        model: new.model.map(str::to_string),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO scenarios
            (id, name, description, llm_instructions, recommended_for,
             category, duration_minutes, active, model, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&scenario.id)
    .bind(&scenario.name)
    .bind(&scenario.description)
    .bind(&scenario.llm_instructions)
    .bind(&scenario.recommended_for)
    .bind(&scenario.category)
    .bind(scenario.duration_minutes)
    .bind(scenario.active)
    .bind(&scenario.model)
    .bind(scenario.created_at)
    .execute(pool)
    .await?;

    Ok(scenario)
}

/// Get a scenario by ID.
pub async fn get_scenario(pool: &SqlitePool, id: &str) -> Result<Scenario> {
    sqlx::query_as::<_, Scenario>(
        r#"
        SELECT id, name, description, llm_instructions, recommended_for,
               category, duration_minutes, active, model, created_at
        FROM scenarios
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Scenario",
        id: id.to_string(),
    })
}

/// All active scenarios, newest first.
pub async fn list_active_scenarios(pool: &SqlitePool) -> Result<Vec<Scenario>> {
    let scenarios = sqlx::query_as::<_, Scenario>(
        r#"
        SELECT id, name, description, llm_instructions, recommended_for,
               category, duration_minutes, active, model, created_at
        FROM scenarios
        WHERE active = 1
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(scenarios)
}
