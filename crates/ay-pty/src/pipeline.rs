//! Output Pipeline: decodes PTY byte chunks into lines and fans them out to
//! the Ring Buffer, Line Log, and Match Engine.
//!
//! The terminal mirror and raw log both want the *verbatim* bytes (ANSI
//! included); callers write those themselves from the same `on_data`
//! callback that drives [`Pipeline::on_chunk`], which preserves PTY read
//! order across all sinks without this crate needing to own stdout.

use std::time::Instant;

use ay_core::{AssistantProfile, MatchState};

use crate::error::Result;
use crate::logs::LogSinks;
use crate::matcher::MatchEngine;
use crate::responder::AutoResponder;
use crate::ring::RingBuffer;

/// Lowest Braille pattern codepoint used by spinner animations.
const BRAILLE_LOW: char = '\u{2800}';
/// Highest Braille pattern codepoint used by spinner animations.
const BRAILLE_HIGH: char = '\u{28ff}';

/// Returns `true` if `chunk` carries anything beyond spinner redraw noise:
/// Braille animation glyphs, bare carriage returns/newlines, and whitespace.
/// A chunk that is *only* such noise must not reset the Match Engine's
/// debounce timer, or a busy spinner would look like continuous real output
/// and the engine would never settle on a classification.
pub fn is_meaningful_chunk(chunk: &str) -> bool {
    chunk
        .chars()
        .any(|c| !(c.is_whitespace() || (BRAILLE_LOW..=BRAILLE_HIGH).contains(&c)))
}

/// Incremental line decoder: strips ANSI CSI/OSC sequences, splits on
/// newline/carriage-return, and buffers a partial trailing line across
/// chunks.
#[derive(Default)]
struct LineDecoder {
    pending: String,
}

impl LineDecoder {
    fn feed(&mut self, raw: &[u8]) -> Vec<String> {
        let stripped = strip_ansi_escapes::strip(raw);
        let text = String::from_utf8_lossy(&stripped);
        self.pending.push_str(&text);

        let mut lines = Vec::new();
        loop {
            let Some(idx) = self.pending.find(['\n', '\r']) else {
                break;
            };
            let line = self.pending[..idx].to_string();
            self.pending.drain(..=idx);
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }
}

/// Outcome of feeding one PTY byte chunk through the pipeline.
pub struct ChunkOutcome {
    /// Decoded lines produced by this chunk (already written to the line
    /// log and ring buffer).
    pub lines: Vec<String>,
    /// A debounced Match Engine transition, if one was just committed.
    pub transition: Option<MatchState>,
    /// Bytes the Auto-Responder wants injected into the PTY via the Input
    /// Mux, if `transition` warranted one.
    pub injection: Option<String>,
}

/// Owns everything downstream of the PTY's raw byte stream except the
/// terminal mirror itself: raw/line/debug logs, the ring buffer, the Match
/// Engine, and the Auto-Responder.
pub struct Pipeline {
    decoder: LineDecoder,
    ring: RingBuffer,
    logs: LogSinks,
    matcher: MatchEngine,
    responder: AutoResponder,
    terminated: bool,
}

impl Pipeline {
    pub fn new(profile: &AssistantProfile, logs: LogSinks, auto_yes: bool) -> Result<Self> {
        Ok(Self {
            decoder: LineDecoder::default(),
            ring: RingBuffer::new(),
            logs,
            matcher: MatchEngine::new(profile)?,
            responder: AutoResponder::new(profile, auto_yes),
            terminated: false,
        })
    }

    pub fn ring_snapshot(&self) -> Vec<String> {
        self.ring.snapshot()
    }

    pub fn match_state(&self) -> MatchState {
        self.matcher.state()
    }

    pub fn has_reached_ready(&self) -> bool {
        self.matcher.has_reached_ready()
    }

    /// Process one chunk of raw PTY output. Returns `ChunkOutcome::default`
    /// equivalent (empty) once the pipeline has been terminated — further
    /// writes are silently dropped.
    pub fn on_chunk(&mut self, raw: &[u8], now: Instant) -> ChunkOutcome {
        if self.terminated {
            return ChunkOutcome {
                lines: Vec::new(),
                transition: None,
                injection: None,
            };
        }

        self.logs.write_raw(raw);
        let lines = self.decoder.feed(raw);

        let mut transition = None;
        for line in &lines {
            self.logs.write_line(line);
            self.ring.push(line.clone());
            if is_meaningful_chunk(line) {
                if let Some(t) = self.matcher.feed(line, now) {
                    transition = Some(t);
                    self.logs.write_debug(&format!("match-engine: -> {t}"));
                }
            }
        }

        let injection = transition.and_then(|t| {
            let reply = self.responder.on_transition(t)?;
            self.logs
                .write_debug(&format!("auto-responder: injecting {reply:?}"));
            Some(reply.to_string())
        });
        if injection.is_some() {
            // A reply was sent, so the assistant is working again.
            self.matcher.mark_working();
        }

        ChunkOutcome {
            lines,
            transition,
            injection,
        }
    }

    /// Periodic tick so a stable classification with no further output still
    /// crosses the debounce threshold. See [`MatchEngine::tick`].
    pub fn tick(&mut self, now: Instant) -> Option<MatchState> {
        if self.terminated {
            return None;
        }
        self.matcher.tick(now)
    }

    pub fn force_ready_after_timeout(
        &mut self,
        now: Instant,
        timeout: std::time::Duration,
    ) -> Option<MatchState> {
        self.matcher.force_ready_after_timeout(now, timeout)
    }

    pub fn mark_working(&mut self) {
        self.matcher.mark_working();
    }

    /// Terminates the pipeline: further `on_chunk` calls are no-ops, logs
    /// are flushed and closed.
    pub fn terminate(&mut self) {
        self.matcher.mark_terminated();
        self.logs.flush();
        self.terminated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> AssistantProfile {
        AssistantProfile {
            argv_prefix: vec![],
            ready_patterns: vec!["> $".into()],
            confirm_patterns: vec![r"\(y/N\)".into()],
            dangerous_patterns: vec!["rm -rf".into()],
            reply_keys: "\n".into(),
            install_hint: None,
        }
    }

    fn test_logs() -> LogSinks {
        let mut dir = std::env::temp_dir();
        dir.push(format!(
            "ay-pty-pipeline-test-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        LogSinks::open(&dir, ay_core::Pid(1)).unwrap()
    }

    #[test]
    fn spinner_only_chunk_is_not_meaningful() {
        assert!(!is_meaningful_chunk("\u{2847}\u{2826} \r"));
    }

    #[test]
    fn chunk_with_real_text_is_meaningful() {
        assert!(is_meaningful_chunk("Loading\u{2847} assets"));
    }

    #[test]
    fn chunk_lines_are_decoded_and_ansi_stripped() {
        let mut p = Pipeline::new(&profile(), test_logs(), true).unwrap();
        let outcome = p.on_chunk(b"\x1b[31mhello\x1b[0m\n", Instant::now());
        assert_eq!(outcome.lines, vec!["hello".to_string()]);
    }

    #[test]
    fn terminate_drops_further_chunks() {
        let mut p = Pipeline::new(&profile(), test_logs(), true).unwrap();
        p.terminate();
        let outcome = p.on_chunk(b"should be dropped\n", Instant::now());
        assert!(outcome.lines.is_empty());
        assert_eq!(p.match_state(), MatchState::Terminated);
    }

    #[test]
    fn confirmation_transition_yields_injection_after_debounce() {
        let mut p = Pipeline::new(&profile(), test_logs(), true).unwrap();
        let t0 = Instant::now();
        p.on_chunk(b"> \n", t0);
        let t1 = t0 + std::time::Duration::from_millis(50);
        p.on_chunk(b"Apply changes? (y/N) \n", t1);
        let t2 = t1 + std::time::Duration::from_millis(150);
        let outcome = p.on_chunk(b"Apply changes? (y/N) \n", t2);
        assert_eq!(outcome.transition, Some(MatchState::AwaitingConfirmation));
        assert_eq!(outcome.injection.as_deref(), Some("\n"));
    }
}
