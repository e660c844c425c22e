//! The `pid_records` row type.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered session. Stored as the column's `TEXT`
/// value, matching the table's `CHECK (status IN (...))` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Idle,
    Active,
    Exited,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Active => "active",
            Status::Exited => "exited",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Status::Idle),
            "active" => Some(Status::Active),
            "exited" => Some(Status::Exited),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the Process Registry: a session keyed by its OS process id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidRecord {
    pub pid: u32,
    pub cli: String,
    pub args: Vec<String>,
    pub prompt: Option<String>,
    pub log_file: String,
    pub fifo_file: String,
    pub status: Status,
    pub exit_reason: String,
    pub exit_code: Option<i32>,
    /// Milliseconds since epoch.
    pub started_at: i64,
    /// Milliseconds since epoch.
    pub updated_at: i64,
}
