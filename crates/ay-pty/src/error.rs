//! Error types for the ay-pty crate.

use thiserror::Error;

/// All errors that can originate from PTY/pipeline operations.
#[derive(Debug, Error)]
pub enum PtyError {
    /// PTY allocation or child-process spawn failed. The caller should
    /// abort startup before touching the Registry when this occurs.
    #[error("PTY spawn error: {0}")]
    PtySpawn(String),

    /// Underlying I/O failure (read, write, flush).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An individual pattern string in an `AssistantProfile` failed to
    /// compile as a regex.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, PtyError>;
