//! Scenario catalog routes.

use axum::extract::State;
use axum::Json;
use database::{scenario, Scenario};
use serde::Serialize;

use crate::error::Result;
use crate::state::AppState;

/// A scenario as listed to managers.
///
/// Character notes stay server-side; they script the simulated character.
#[derive(Serialize)]
pub struct ScenarioInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub recommended_for: String,
    pub category: String,
    pub duration_minutes: i64,
}

impl From<Scenario> for ScenarioInfo {
    fn from(scenario: Scenario) -> Self {
        Self {
            id: scenario.id,
            name: scenario.name,
            description: scenario.description,
            recommended_for: scenario.recommended_for,
            category: scenario.category,
            duration_minutes: scenario.duration_minutes,
        }
    }
}

/// List active scenarios.
pub async fn list_api(State(state): State<AppState>) -> Result<Json<Vec<ScenarioInfo>>> {
    let pool = state.orchestrator.database().pool();
    let scenarios = scenario::list_active_scenarios(pool).await?;
    Ok(Json(scenarios.into_iter().map(ScenarioInfo::from).collect()))
}
