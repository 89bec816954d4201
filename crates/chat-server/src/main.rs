//! Chat server binary.
//!
//! Serves the REST session endpoints and the per-session WebSockets that
//! carry client actions in and chat events out.

mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use database::Database;
use openai_gateway::{OpenAiGateway, OpenAiGatewayConfig};
use orchestrator::{ChatOrchestrator, OrchestratorConfig};
use tracing::info;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting chat server");

    // Connect to database
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    // Model gateway; its default model also serves sessions whose scenario
    // does not pin one.
    let gateway_config = OpenAiGatewayConfig::from_env()?;
    let orchestrator_config = OrchestratorConfig {
        default_model: gateway_config.default_model.clone(),
        review_model: config.review_model.clone(),
        coach_model: config.coach_model.clone(),
    };
    let gateway = Arc::new(OpenAiGateway::new(gateway_config)?);

    // Build application state
    let orchestrator = ChatOrchestrator::new(db, gateway, orchestrator_config);
    let state = AppState::new(orchestrator);

    // Build router
    let app = routes::router().with_state(state);

    // Start server
    info!(addr = %config.addr, "Chat server listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
