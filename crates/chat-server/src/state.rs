//! Application state shared across handlers.

use orchestrator::ChatOrchestrator;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The orchestrator serving every session.
    pub orchestrator: ChatOrchestrator,
}

impl AppState {
    /// Create new application state.
    pub fn new(orchestrator: ChatOrchestrator) -> Self {
        Self { orchestrator }
    }
}
