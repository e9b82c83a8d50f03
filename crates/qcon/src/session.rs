use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::credential::Credential;
use crate::error::ConsoleError;

/// Session changes mirrored across browser tabs (or processes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn,
    TokenRefreshed,
    LoggedOut,
}

impl SessionEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoggedIn => "logged_in",
            Self::TokenRefreshed => "token_refreshed",
            Self::LoggedOut => "logged_out",
        }
    }
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub credential: Option<Credential>,
}

impl From<&Credential> for SessionSnapshot {
    fn from(credential: &Credential) -> Self {
        Self {
            credential: Some(credential.clone()),
        }
    }
}

/// Inbound mirror message, tagged with the publishing participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossTabMessage {
    pub event: SessionEvent,
    pub snapshot: SessionSnapshot,
    pub source_id: String,
}

/// Publish/subscribe boundary for session mirroring.
///
/// Subscribers receive every message, including their own; consumers filter
/// on `source_id`.
#[async_trait]
pub trait SessionBroadcast: Send + Sync {
    /// Identity stamped on messages published through this handle.
    fn source_id(&self) -> &str;

    async fn broadcast(
        &self,
        event: SessionEvent,
        snapshot: SessionSnapshot,
    ) -> Result<(), ConsoleError>;

    fn subscribe(&self) -> broadcast::Receiver<CrossTabMessage>;
}
