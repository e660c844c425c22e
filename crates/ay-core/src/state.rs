use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of the assistant's current screen output.
///
/// `Starting` is the only valid initial state and `Terminated` the only
/// terminal one; all other transitions are driven by the Match Engine
/// re-evaluating its tail window against an `AssistantProfile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchState {
    Starting,
    Idle,
    AwaitingConfirmation,
    AwaitingDangerousConfirmation,
    Working,
    Terminated,
}

impl MatchState {
    /// Relative precedence used when a single tail window matches more than
    /// one pattern category at once. Higher wins.
    fn rank(self) -> u8 {
        match self {
            MatchState::AwaitingDangerousConfirmation => 3,
            MatchState::AwaitingConfirmation => 2,
            MatchState::Idle => 1,
            MatchState::Starting | MatchState::Working | MatchState::Terminated => 0,
        }
    }

    /// Resolve simultaneous matches using the tie-break order
    /// `dangerous > confirm > ready`, regardless of pattern source order.
    pub fn resolve_precedence(candidates: &[MatchState]) -> Option<MatchState> {
        candidates.iter().copied().max_by_key(|s| s.rank())
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MatchState::Terminated)
    }

    pub fn is_ready(self) -> bool {
        matches!(self, MatchState::Idle)
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchState::Starting => "starting",
            MatchState::Idle => "idle",
            MatchState::AwaitingConfirmation => "awaiting-confirmation",
            MatchState::AwaitingDangerousConfirmation => "awaiting-dangerous-confirmation",
            MatchState::Working => "working",
            MatchState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangerous_outranks_confirm_and_ready() {
        let candidates = [
            MatchState::Idle,
            MatchState::AwaitingConfirmation,
            MatchState::AwaitingDangerousConfirmation,
        ];
        assert_eq!(
            MatchState::resolve_precedence(&candidates),
            Some(MatchState::AwaitingDangerousConfirmation)
        );
    }

    #[test]
    fn confirm_outranks_ready() {
        let candidates = [MatchState::Idle, MatchState::AwaitingConfirmation];
        assert_eq!(
            MatchState::resolve_precedence(&candidates),
            Some(MatchState::AwaitingConfirmation)
        );
    }

    #[test]
    fn empty_candidates_resolve_to_none() {
        assert_eq!(MatchState::resolve_precedence(&[]), None);
    }

    #[test]
    fn display_is_kebab_case() {
        assert_eq!(MatchState::AwaitingDangerousConfirmation.to_string(), "awaiting-dangerous-confirmation");
    }
}
