//! Conversation phases and the legal transitions between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three sequential modes of a practice session.
///
/// A session starts in [`Phase::Setup`] (briefing with the coach), advances
/// to [`Phase::RolePlay`] (the simulated conversation itself), and ends in
/// [`Phase::Debrief`] (reflection). Phases only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    RolePlay,
    Debrief,
}

impl Phase {
    /// Stable string form, identical to the persisted column values.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::RolePlay => "role_play",
            Phase::Debrief => "debrief",
        }
    }

    /// Parse the persisted string form back into a phase.
    pub fn parse(value: &str) -> Option<Phase> {
        match value {
            "setup" => Some(Phase::Setup),
            "role_play" => Some(Phase::RolePlay),
            "debrief" => Some(Phase::Debrief),
            _ => None,
        }
    }

    /// Whether `target` is a legal next phase.
    ///
    /// Only `setup -> role_play` and `role_play -> debrief` are allowed;
    /// everything else (backwards, self, skipping) is rejected.
    pub fn can_advance_to(&self, target: Phase) -> bool {
        matches!(
            (self, target),
            (Phase::Setup, Phase::RolePlay) | (Phase::RolePlay, Phase::Debrief)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string_form() {
        for phase in [Phase::Setup, Phase::RolePlay, Phase::Debrief] {
            assert_eq!(Phase::parse(phase.as_str()), Some(phase));
        }
        assert_eq!(Phase::parse("intermission"), None);
    }

    #[test]
    fn only_forward_transitions_are_legal() {
        assert!(Phase::Setup.can_advance_to(Phase::RolePlay));
        assert!(Phase::RolePlay.can_advance_to(Phase::Debrief));

        assert!(!Phase::Setup.can_advance_to(Phase::Debrief));
        assert!(!Phase::Setup.can_advance_to(Phase::Setup));
        assert!(!Phase::RolePlay.can_advance_to(Phase::Setup));
        assert!(!Phase::Debrief.can_advance_to(Phase::RolePlay));
        assert!(!Phase::Debrief.can_advance_to(Phase::Debrief));
    }

    #[test]
    fn serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&Phase::RolePlay).unwrap(),
            "\"role_play\""
        );
        let parsed: Phase = serde_json::from_str("\"debrief\"").unwrap();
        assert_eq!(parsed, Phase::Debrief);
    }
}
