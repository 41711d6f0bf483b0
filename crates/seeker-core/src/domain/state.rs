//! Pipeline state machine for one envelope.

use serde::{Deserialize, Serialize};

/// Pipeline state.
///
/// State transitions:
/// - Received -> Translating -> TranslationFailed -> Notified
/// - Received -> Translating -> TranslationInvalid -> Notified
/// - Received -> Translating -> Translated -> Searching -> SearchFailed -> Notified
/// - Received -> Translating -> Translated -> Searching -> ResultsReady -> Notified
///
/// `Notified` is reached whether or not the notifier succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Received,
    Translating,
    TranslationFailed,
    TranslationInvalid,
    Translated,
    Searching,
    SearchFailed,
    ResultsReady,
    Notified,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Notified)
    }

    /// States after which the only remaining step is the final notification.
    pub fn is_outcome(self) -> bool {
        matches!(
            self,
            PipelineState::TranslationFailed
                | PipelineState::TranslationInvalid
                | PipelineState::SearchFailed
                | PipelineState::ResultsReady
        )
    }
}

/// What the user was told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Results { count: usize },
    NothingFound,
    NotUnderstood,
    TranslationFailed,
    SearchFailed,
}

/// Trace of one pipeline run, returned to the consumer for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub path: Vec<PipelineState>,
    pub outcome: Outcome,
    /// Whether the final notification was accepted by the notifier.
    pub delivered: bool,
}

impl PipelineReport {
    pub fn final_state(&self) -> Option<PipelineState> {
        self.path.last().copied()
    }

    pub fn visited(&self, state: PipelineState) -> bool {
        self.path.contains(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_notified_is_terminal() {
        assert!(PipelineState::Notified.is_terminal());
        assert!(!PipelineState::SearchFailed.is_terminal());
        assert!(!PipelineState::Received.is_terminal());
    }

    #[test]
    fn outcome_states() {
        assert!(PipelineState::TranslationInvalid.is_outcome());
        assert!(PipelineState::ResultsReady.is_outcome());
        assert!(!PipelineState::Translated.is_outcome());
        assert!(!PipelineState::Notified.is_outcome());
    }

    #[test]
    fn states_serialize_screaming() {
        let s = serde_json::to_string(&PipelineState::TranslationInvalid).unwrap();
        assert_eq!(s, "\"TRANSLATION_INVALID\"");
    }
}
