use qcon::ConsoleError;
use thiserror::Error;

/// Outcome of a failed credential renewal.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("no active credential")]
    NoCredential,

    /// Terminal: the session is over.
    #[error("refresh token rejected: {0}")]
    Rejected(#[source] ConsoleError),

    #[error("single sign-on re-authentication failed: {0}")]
    Sso(#[source] ConsoleError),
}

/// Failure result handed back to the caller of an authenticated request.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("credential renewal failed: {0}")]
    Refresh(#[from] RefreshError),

    /// Authorization failure that must not trigger a refresh (logout endpoint).
    #[error("not authorized (status {status})")]
    Unauthorized { status: u16 },

    #[error("not allowed: {topic}")]
    NotAllowed { topic: String },

    #[error("request timed out")]
    Timeout,

    #[error("network unavailable")]
    Network,

    #[error("request failed with status {status}: {body}")]
    Http { status: u16, body: String },
}

impl GatewayError {
    /// Whether the caller may sensibly retry later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Network)
    }
}
