//! Per-phase sampling parameters and opener strategies.
//!
//! Every phase-dependent knob lives here so the dispatch is exhaustive at
//! compile time instead of scattered across string matches.

use chat_core::{GenerationParams, Phase};

/// The fixed debrief opener. Inserted directly, no model call.
pub const DEBRIEF_OPENER: &str = "How do you think that went?";

/// Sampling temperature for turn replies in a phase.
///
/// Role play runs hottest so the character stays lively; debrief runs
/// coolest so feedback stays grounded in the transcript.
pub fn temperature(phase: Phase) -> f32 {
    match phase {
        Phase::Setup => 0.8,
        Phase::RolePlay => 0.95,
        Phase::Debrief => 0.7,
    }
}

/// Sampling parameters for a turn reply in a phase.
///
/// Turn replies carry no token cap; the prompt keeps them short.
pub fn turn_params(phase: Phase, model: &str) -> GenerationParams {
    GenerationParams::new(model)
        .with_temperature(temperature(phase))
        .with_top_p(0.9)
        .with_presence_penalty(0.2)
        .with_frequency_penalty(0.2)
}

/// How the opening assistant message of a phase is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Opener {
    /// Stream a completion, prompted by a seed user line that is never
    /// persisted to the transcript.
    Streamed {
        seed: &'static str,
        params: GenerationParams,
    },
    /// Insert fixed text without a model call.
    Static(&'static str),
}

/// The opener used when a session enters `phase`.
pub fn opener(phase: Phase, model: &str) -> Opener {
    match phase {
        Phase::Setup => Opener::Streamed {
            seed: "Hello, I'm ready to learn about this scenario.",
            params: GenerationParams::new(model)
                .with_temperature(0.8)
                .with_max_tokens(400),
        },
        Phase::RolePlay => Opener::Streamed {
            seed: "Hello",
            params: GenerationParams::new(model)
                .with_temperature(0.95)
                .with_max_tokens(280),
        },
        Phase::Debrief => Opener::Static(DEBRIEF_OPENER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_temperature_varies_by_phase() {
        assert_eq!(temperature(Phase::Setup), 0.8);
        assert_eq!(temperature(Phase::RolePlay), 0.95);
        assert_eq!(temperature(Phase::Debrief), 0.7);
    }

    #[test]
    fn turn_params_share_sampling_settings_and_carry_no_cap() {
        for phase in [Phase::Setup, Phase::RolePlay, Phase::Debrief] {
            let params = turn_params(phase, "gpt-4o");
            assert_eq!(params.model, "gpt-4o");
            assert_eq!(params.top_p, Some(0.9));
            assert_eq!(params.presence_penalty, Some(0.2));
            assert_eq!(params.frequency_penalty, Some(0.2));
            assert_eq!(params.max_tokens, None);
        }
    }

    #[test]
    fn openers_match_phase() {
        match opener(Phase::Setup, "gpt-4o") {
            Opener::Streamed { seed, params } => {
                assert_eq!(seed, "Hello, I'm ready to learn about this scenario.");
                assert_eq!(params.temperature, Some(0.8));
                assert_eq!(params.max_tokens, Some(400));
            }
            Opener::Static(_) => panic!("setup opener should stream"),
        }

        match opener(Phase::RolePlay, "gpt-4o") {
            Opener::Streamed { seed, params } => {
                assert_eq!(seed, "Hello");
                assert_eq!(params.temperature, Some(0.95));
                assert_eq!(params.max_tokens, Some(280));
            }
            Opener::Static(_) => panic!("role play opener should stream"),
        }

        assert_eq!(
            opener(Phase::Debrief, "gpt-4o"),
            Opener::Static(DEBRIEF_OPENER)
        );
    }
}
