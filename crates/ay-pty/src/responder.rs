//! Auto-Responder: reacts to Match Engine transitions by injecting canned
//! replies through the Input Mux.

use ay_core::{AssistantProfile, MatchState};

/// Decides what (if anything) to inject in response to a Match Engine
/// transition. Holds no PTY handle of its own — callers route its output
/// through the Input Mux so it interleaves correctly with user typing.
pub struct AutoResponder {
    reply_keys: String,
    auto_yes: bool,
}

impl AutoResponder {
    pub fn new(profile: &AssistantProfile, auto_yes: bool) -> Self {
        Self {
            reply_keys: profile.reply_keys.clone(),
            auto_yes,
        }
    }

    /// Given a freshly committed transition, return the bytes to inject
    /// into the PTY, if any.
    ///
    /// - `Awaiting-Confirmation` → the profile's `replyKeys`.
    /// - `Awaiting-Dangerous-Confirmation` → never (the user must answer).
    /// - anything else → never.
    /// - `auto_yes = false` disables injection entirely; the supervisor
    ///   keeps running purely as a logger+multiplexer.
    pub fn on_transition(&self, state: MatchState) -> Option<&str> {
        if !self.auto_yes {
            return None;
        }
        match state {
            MatchState::AwaitingConfirmation => Some(self.reply_keys.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> AssistantProfile {
        AssistantProfile {
            argv_prefix: vec![],
            ready_patterns: vec![],
            confirm_patterns: vec![],
            dangerous_patterns: vec![],
            reply_keys: "\n".into(),
            install_hint: None,
        }
    }

    #[test]
    fn injects_reply_keys_on_confirmation() {
        let r = AutoResponder::new(&profile(), true);
        assert_eq!(r.on_transition(MatchState::AwaitingConfirmation), Some("\n"));
    }

    #[test]
    fn withholds_on_dangerous_confirmation() {
        let r = AutoResponder::new(&profile(), true);
        assert_eq!(r.on_transition(MatchState::AwaitingDangerousConfirmation), None);
    }

    #[test]
    fn auto_yes_false_disables_all_injection() {
        let r = AutoResponder::new(&profile(), false);
        assert_eq!(r.on_transition(MatchState::AwaitingConfirmation), None);
    }

    #[test]
    fn no_injection_on_idle_or_working() {
        let r = AutoResponder::new(&profile(), true);
        assert_eq!(r.on_transition(MatchState::Idle), None);
        assert_eq!(r.on_transition(MatchState::Working), None);
    }
}
