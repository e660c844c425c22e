//! Minimal `clap` surface. Full config discovery and script-name-to-
//! assistant mapping are left to an external collaborator; this is just
//! enough of a CLI to drive the supervisor directly.

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "agent-yes", about = "Supervise an AI coding assistant's PTY session")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Spawn and supervise an assistant inside a PTY.
    Run(RunArgs),
    /// Forward a line to the active session in this workspace, out-of-band.
    Send {
        /// The line to inject into the running session's stdin.
        message: String,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Which profile to run (e.g. "claude"); built-ins are looked up by name.
    pub assistant: String,

    /// Initial prompt appended to argv as a trailing `-- <prompt>`.
    #[arg(long)]
    pub prompt: Option<String>,

    /// Disable all Auto-Responder injection; runs purely as logger+mux.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_yes: bool,

    /// Raise log verbosity to debug.
    #[arg(long)]
    pub verbose: bool,

    /// Extra arguments forwarded verbatim to the assistant binary.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub extra_args: Vec<String>,
}
