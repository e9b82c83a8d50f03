use thiserror::Error;

/// Failures reported by the collaborators behind the connectivity core.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("credential exchange rejected: {code}")]
    Exchange { code: String },

    #[error("realtime channel: {0}")]
    Channel(String),

    #[error("session broadcast: {0}")]
    Broadcast(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ConsoleError {
    pub fn exchange(code: impl Into<String>) -> Self {
        Self::Exchange { code: code.into() }
    }
}
