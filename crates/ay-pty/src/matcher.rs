//! Match Engine: classifies the decoded output tail against an
//! `AssistantProfile` and emits debounced state transitions.
//!
//! Tie-break precedence lives in [`ay_core::state::MatchState`]; the
//! debounce window lives here.

use ay_core::{AssistantProfile, MatchState};
use regex::RegexSet;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{PtyError, Result};

/// Tail window size: ~8 KiB is enough to catch a prompt even behind a
/// burst of preceding output, without rescanning the whole session.
const TAIL_WINDOW_BYTES: usize = 8 * 1024;

/// Debounce window: a classification must persist for this long (or be
/// re-observed on a subsequent chunk) before it is emitted as a transition.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Compiled pattern sets for one `AssistantProfile`.
struct CompiledProfile {
    ready: RegexSet,
    confirm: RegexSet,
    dangerous: RegexSet,
}

impl CompiledProfile {
    fn compile(profile: &AssistantProfile) -> Result<Self> {
        Ok(Self {
            ready: build_set(&profile.ready_patterns)?,
            confirm: build_set(&profile.confirm_patterns)?,
            dangerous: build_set(&profile.dangerous_patterns)?,
        })
    }
}

fn build_set(patterns: &[String]) -> Result<RegexSet> {
    RegexSet::new(patterns).map_err(|source| PtyError::InvalidPattern {
        pattern: patterns.join(", "),
        source,
    })
}

struct PendingTransition {
    candidate: MatchState,
    since: Instant,
}

/// Output-pattern state machine. One instance per session.
pub struct MatchEngine {
    compiled: CompiledProfile,
    tail: String,
    state: MatchState,
    pending: Option<PendingTransition>,
    started_at: Instant,
    reached_ready: bool,
}

impl MatchEngine {
    pub fn new(profile: &AssistantProfile) -> Result<Self> {
        Ok(Self {
            compiled: CompiledProfile::compile(profile)?,
            tail: String::new(),
            state: MatchState::Starting,
            pending: None,
            started_at: Instant::now(),
            reached_ready: false,
        })
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn has_reached_ready(&self) -> bool {
        self.reached_ready
    }

    /// Feed a decoded (ANSI-stripped) chunk of output. Returns `Some(state)`
    /// exactly when a debounced transition is committed.
    ///
    /// Pure spinner/whitespace redraw chunks (see
    /// [`crate::pipeline::is_meaningful_chunk`]) do not reset the debounce
    /// timer — the engine is never called with them in the first place,
    /// since the pipeline filters before feeding the engine.
    pub fn feed(&mut self, chunk: &str, now: Instant) -> Option<MatchState> {
        self.push_tail(chunk);

        let candidate = self.classify();
        let Some(candidate) = candidate else {
            self.pending = None;
            return None;
        };

        if candidate == self.state {
            self.pending = None;
            return None;
        }

        match &self.pending {
            Some(p) if p.candidate == candidate => {
                if now.duration_since(p.since) >= DEBOUNCE {
                    self.commit(candidate, now);
                    return Some(candidate);
                }
                None
            }
            _ => {
                self.pending = Some(PendingTransition {
                    candidate,
                    since: now,
                });
                None
            }
        }
    }

    /// Call periodically (even with no new output) so a stable-but-idle
    /// classification still crosses the debounce threshold.
    pub fn tick(&mut self, now: Instant) -> Option<MatchState> {
        let p = self.pending.as_ref()?;
        if now.duration_since(p.since) >= DEBOUNCE {
            let candidate = p.candidate;
            self.commit(candidate, now);
            return Some(candidate);
        }
        None
    }

    /// Force a transition to `Idle` if `readyPatterns` has never matched and
    /// `timeout` has elapsed since the engine was created. See DESIGN.md's
    /// Open Question 2 — avoids deadlocking the pre-Ready Control-C window
    /// behind a profile whose ready pattern never matches.
    pub fn force_ready_after_timeout(&mut self, now: Instant, timeout: Duration) -> Option<MatchState> {
        if self.reached_ready || self.state != MatchState::Starting {
            return None;
        }
        if now.duration_since(self.started_at) >= timeout {
            debug!("ready-pattern timeout elapsed, forcing Idle");
            self.commit(MatchState::Idle, now);
            return Some(MatchState::Idle);
        }
        None
    }

    /// Driven externally by the Auto-Responder (reply sent) or Input Mux
    /// (user input on a dangerous prompt) — the engine itself never infers
    /// `Working` from patterns alone.
    pub fn mark_working(&mut self) {
        if matches!(
            self.state,
            MatchState::AwaitingConfirmation | MatchState::AwaitingDangerousConfirmation
        ) {
            self.state = MatchState::Working;
            self.pending = None;
            // The already-answered prompt text is still sitting in the tail
            // window and would otherwise keep matching as a "new" candidate
            // until enough fresh output pushes it out. Drop it so the same
            // occurrence can't be classified, and thus replied to, twice.
            self.tail.clear();
        }
    }

    pub fn mark_terminated(&mut self) {
        self.state = MatchState::Terminated;
        self.pending = None;
    }

    fn commit(&mut self, candidate: MatchState, _now: Instant) {
        if candidate == MatchState::Idle {
            self.reached_ready = true;
        }
        self.state = candidate;
        self.pending = None;
    }

    fn push_tail(&mut self, chunk: &str) {
        self.tail.push_str(chunk);
        if self.tail.len() > TAIL_WINDOW_BYTES {
            let excess = self.tail.len() - TAIL_WINDOW_BYTES;
            let mut cut = excess;
            while !self.tail.is_char_boundary(cut) {
                cut += 1;
            }
            self.tail.drain(..cut);
        }
    }

    /// Resolve the current tail against all three pattern categories,
    /// applying `dangerous > confirm > ready` precedence.
    fn classify(&self) -> Option<MatchState> {
        let mut candidates = Vec::with_capacity(3);
        if self.compiled.dangerous.is_match(&self.tail) {
            candidates.push(MatchState::AwaitingDangerousConfirmation);
        }
        if self.compiled.confirm.is_match(&self.tail) {
            candidates.push(MatchState::AwaitingConfirmation);
        }
        if self.compiled.ready.is_match(&self.tail) {
            candidates.push(MatchState::Idle);
        }
        MatchState::resolve_precedence(&candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> AssistantProfile {
        AssistantProfile {
            argv_prefix: vec!["claude".into()],
            ready_patterns: vec![r"> $".into()],
            confirm_patterns: vec![r"\(y/N\)".into()],
            dangerous_patterns: vec![r"rm -rf".into()],
            reply_keys: "\n".into(),
            install_hint: None,
        }
    }

    #[test]
    fn starting_transitions_to_idle_on_ready_pattern_after_debounce() {
        let mut engine = MatchEngine::new(&profile()).unwrap();
        let t0 = Instant::now();
        assert_eq!(engine.feed("Loading...\n> ", t0), None);
        let t1 = t0 + Duration::from_millis(150);
        assert_eq!(engine.feed("> ", t1), Some(MatchState::Idle));
        assert!(engine.has_reached_ready());
    }

    #[test]
    fn dangerous_takes_precedence_over_confirm_and_ready() {
        let mut engine = MatchEngine::new(&profile()).unwrap();
        let t0 = Instant::now();
        engine.feed("> ", t0 + Duration::from_millis(150));
        let t1 = t0 + Duration::from_millis(300);
        engine.feed("About to rm -rf /tmp/x (y/N) > ", t1);
        let t2 = t1 + Duration::from_millis(150);
        let transition = engine.feed("About to rm -rf /tmp/x (y/N) > ", t2);
        assert_eq!(transition, Some(MatchState::AwaitingDangerousConfirmation));
    }

    #[test]
    fn mark_working_only_applies_from_confirmation_states() {
        let mut engine = MatchEngine::new(&profile()).unwrap();
        engine.mark_working();
        assert_eq!(engine.state(), MatchState::Starting);
    }

    #[test]
    fn force_ready_after_timeout_when_pattern_never_matches() {
        let mut engine = MatchEngine::new(&profile()).unwrap();
        let t0 = Instant::now();
        engine.feed("this profile's ready pattern never appears", t0);
        let later = t0 + Duration::from_secs(31);
        let transition = engine.force_ready_after_timeout(later, Duration::from_secs(30));
        assert_eq!(transition, Some(MatchState::Idle));
        assert!(engine.has_reached_ready());
    }

    #[test]
    fn mark_working_clears_tail_so_answered_prompt_does_not_rematch() {
        let mut engine = MatchEngine::new(&profile()).unwrap();
        let t0 = Instant::now();
        engine.feed("Proceed? (y/N) ", t0);
        let t1 = t0 + Duration::from_millis(150);
        let transition = engine.feed("Proceed? (y/N) ", t1);
        assert_eq!(transition, Some(MatchState::AwaitingConfirmation));

        engine.mark_working();
        assert_eq!(engine.state(), MatchState::Working);

        // The same "(y/N)" text is still what the assistant last printed,
        // but it must not be classified (and thus replied to) again.
        let t2 = t1 + Duration::from_millis(50);
        assert_eq!(engine.feed("Applying...", t2), None);
        let t3 = t2 + Duration::from_millis(150);
        assert_eq!(engine.feed("Applying...", t3), None);
        assert_eq!(engine.state(), MatchState::Working);
    }

    #[test]
    fn transient_candidate_without_repeat_is_not_committed() {
        let mut engine = MatchEngine::new(&profile()).unwrap();
        let t0 = Instant::now();
        // Single chunk, no repeat/tick before a different candidate arrives.
        assert_eq!(engine.feed("> ", t0), None);
    }
}
