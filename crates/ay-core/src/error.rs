use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid assistant profile {name:?}: {reason}")]
    InvalidProfile { name: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
