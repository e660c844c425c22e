use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Per-assistant record of patterns and reply keys consulted by the Match
/// Engine and Auto-Responder. Plain data, no polymorphism on the assistant
/// itself — a new assistant is a new profile value, not a new type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantProfile {
    /// Argv fragments prepended before the user's own trailing args, e.g.
    /// `["claude"]`.
    pub argv_prefix: Vec<String>,
    /// Substrings/regexes meaning "interactive prompt visible".
    pub ready_patterns: Vec<String>,
    /// Substrings/regexes meaning "awaiting yes/no confirmation".
    pub confirm_patterns: Vec<String>,
    /// Substrings/regexes meaning "awaiting a destructive-action confirmation".
    pub dangerous_patterns: Vec<String>,
    /// Ordered key sequence sent on a non-dangerous confirmation.
    pub reply_keys: String,
    /// Shown to the user when the assistant binary can't be found.
    pub install_hint: Option<String>,
}

impl AssistantProfile {
    /// Built-in profile for Claude Code, used when the caller supplies no
    /// explicit profile table entry for the requested assistant name. Real
    /// profile sourcing from per-project or user config is not implemented
    /// here — this is the one built-in entry that table would otherwise
    /// populate.
    pub fn claude_default() -> Self {
        Self {
            argv_prefix: vec!["claude".to_string()],
            ready_patterns: vec!["\u{2502} >".to_string(), "Human:".to_string()],
            confirm_patterns: vec!["(y/n)".to_string(), "Do you want to proceed?".to_string()],
            dangerous_patterns: vec![
                "rm -rf".to_string(),
                "This will overwrite".to_string(),
                "cannot be undone".to_string(),
            ],
            reply_keys: "\n".to_string(),
            install_hint: Some(
                "install Claude Code first: https://docs.claude.com/claude-code".to_string(),
            ),
        }
    }

    /// Look up a built-in profile by assistant name.
    pub fn resolve(name: &str) -> Result<Self> {
        match name {
            "claude" => Ok(Self::claude_default()),
            other => Err(CoreError::InvalidProfile {
                name: other.to_string(),
                reason: "no built-in profile registered for this assistant name".to_string(),
            }),
        }
    }
}

/// Supervisor-wide tunables. Not a config-file format — the values here are
/// either hard-coded defaults or set directly by the (out-of-scope) CLI
/// collaborator via `agent-yes`'s thin `clap` surface.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Whether the Auto-Responder is allowed to inject replies at all.
    pub auto_yes: bool,
    /// Raise log verbosity to debug.
    pub verbose: bool,
    /// Fallback: force a transition out of `Starting` to `Idle` if no
    /// `readyPatterns` match lands within this many seconds. See
    /// DESIGN.md's Open Question 2 — readyPatterns is the sole authoritative
    /// gate, but a broken pattern must not deadlock the pre-Ready window.
    pub ready_timeout_secs: u64,
    /// Bounded wait for child exit after forwarding SIGTERM before
    /// escalating to SIGKILL.
    pub shutdown_grace_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            auto_yes: true,
            verbose: false,
            ready_timeout_secs: 30,
            shutdown_grace_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_unknown_assistant_is_invalid_profile() {
        let err = AssistantProfile::resolve("nonexistent-assistant");
        assert!(matches!(err, Err(CoreError::InvalidProfile { .. })));
    }

    #[test]
    fn claude_default_has_non_empty_patterns() {
        let p = AssistantProfile::claude_default();
        assert!(!p.ready_patterns.is_empty());
        assert!(!p.confirm_patterns.is_empty());
        assert!(!p.dangerous_patterns.is_empty());
        assert_eq!(p.reply_keys, "\n");
    }

    #[test]
    fn supervisor_config_defaults_match_spec() {
        let c = SupervisorConfig::default();
        assert_eq!(c.ready_timeout_secs, 30);
        assert_eq!(c.shutdown_grace_secs, 5);
        assert!(c.auto_yes);
    }
}
