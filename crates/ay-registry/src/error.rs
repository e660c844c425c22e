use thiserror::Error;

/// Errors that can occur in the Process Registry or its IPC endpoints.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No record exists for the requested pid.
    #[error("no registry record for pid {pid}")]
    NotFound { pid: u32 },

    /// `argv` failed to (de)serialize to/from its stored JSON column.
    #[error("argv serialization error: {0}")]
    Argv(#[from] serde_json::Error),

    /// The IPC endpoint (FIFO/named pipe) could not be created or removed.
    #[error("IPC endpoint error: {0}")]
    Ipc(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
