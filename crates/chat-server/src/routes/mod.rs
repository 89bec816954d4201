//! Route handlers for the chat server.

pub mod coach;
pub mod health;
pub mod scenarios;
pub mod sessions;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use orchestrator::Caller;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health))
        // Scenario catalog
        .route("/api/scenarios", get(scenarios::list_api))
        // Session lifecycle
        .route("/api/sessions", post(sessions::create_api))
        .route("/api/sessions/:id/messages", get(sessions::messages_api))
        .route("/api/sessions/:id/complete", post(sessions::complete_api))
        .route("/api/sessions/:id/ws", get(sessions::ws_api))
        // Post-session coaching
        .route("/api/sessions/:id/coach/messages", get(coach::messages_api))
        .route("/api/sessions/:id/coach/ws", get(coach::ws_api))
}

/// Caller identity from request headers.
///
/// Authentication happens upstream; these headers are the contract with
/// that layer. `x-admin` is optional and defaults to false.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ApiError> {
    let tenant_id = header_value(headers, "x-tenant-id")?;
    let operator_id = header_value(headers, "x-operator-id")?;
    let admin = headers
        .get("x-admin")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == "true" || value == "1")
        .unwrap_or(false);

    Ok(Caller {
        tenant_id,
        operator_id,
        admin,
    })
}

fn header_value(headers: &HeaderMap, name: &'static str) -> Result<String, ApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::MissingHeader(name))
}
