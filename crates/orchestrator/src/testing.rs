//! Shared fixtures for orchestrator tests.

use std::sync::Arc;
use std::time::Duration;

use chat_core::ChatEvent;
use database::scenario::{self, NewScenario};
use database::{Database, Scenario};
use mock_gateway::ScriptedGateway;
use tokio::sync::mpsc;

use crate::chat::{Caller, ChatOrchestrator, OrchestratorConfig};

pub(crate) const SCENARIO_INSTRUCTIONS: &str = "Coach Mode: orchestrate a feedback exercise.\n\
    • Name: Amira\n\
    • Role & Tenure: Support engineer, 2 years\n\
    • Personality: direct, a little defensive\n\
    • Emotional State: anxious about the reorg\n\
    • Worries: losing ownership of the escalation queue\n";

pub(crate) struct Harness {
    pub db: Database,
    pub gateway: ScriptedGateway,
    pub orchestrator: ChatOrchestrator,
    pub scenario: Scenario,
}

pub(crate) async fn harness() -> Harness {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.migrate().await.unwrap();
    let scenario = scenario::create_scenario(
        db.pool(),
        &NewScenario {
            name: "Missed deadlines",
            description: "Give direct feedback about two missed deadlines.",
            llm_instructions: SCENARIO_INSTRUCTIONS,
            recommended_for: "New engineering managers",
            category: "Feedback",
            duration_minutes: 5,
            model: None,
        },
    )
    .await
    .unwrap();

    let gateway = ScriptedGateway::new();
    let orchestrator = ChatOrchestrator::new(
        db.clone(),
        Arc::new(gateway.clone()),
        OrchestratorConfig::default(),
    );

    Harness {
        db,
        gateway,
        orchestrator,
        scenario,
    }
}

pub(crate) fn caller() -> Caller {
    Caller {
        tenant_id: "tenant-1".to_string(),
        operator_id: "manager-1".to_string(),
        admin: false,
    }
}

pub(crate) fn admin() -> Caller {
    Caller {
        admin: true,
        ..caller()
    }
}

/// Everything currently buffered on `rx`.
pub(crate) fn drain_now(rx: &mut mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Receive until an event satisfies `predicate`, returning everything
/// received including the match. Panics after five seconds.
pub(crate) async fn recv_until(
    rx: &mut mpsc::Receiver<ChatEvent>,
    predicate: impl Fn(&ChatEvent) -> bool,
) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed");
        let done = predicate(&event);
        events.push(event);
        if done {
            return events;
        }
    }
}
