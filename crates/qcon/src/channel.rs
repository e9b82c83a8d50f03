use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConsoleError;

/// The live transport to the messaging endpoint.
///
/// `open` and `close` are idempotent. Events produced by the channel are
/// delivered separately as [`ChannelEvent`]s.
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    async fn open(&self, token: &str) -> Result<(), ConsoleError>;
    async fn close(&self) -> Result<(), ConsoleError>;
    fn is_open(&self) -> bool;
}

/// Events emitted by the realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Raw health report entries, parsed leniently by the consumer.
    ServiceHealthBatch {
        reports: Vec<serde_json::Value>,
        timestamp: i64,
    },
    TransportError(TransportErrorInfo),
    TransportDisconnected,
    TransportReady { timestamp: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectCause {
    /// Request-timeout class: degrade to Connecting right away.
    Timeout,
    /// The link is known to be gone.
    Disconnected,
    Other,
}

/// Error payload delivered by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportErrorInfo {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl TransportErrorInfo {
    pub fn with_status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn cause(&self) -> ReconnectCause {
        match (self.status, self.code.as_deref()) {
            (Some(408), _) | (_, Some("RequestTimeout")) => ReconnectCause::Timeout,
            (Some(0), _) | (_, Some("Disconnected" | "NotConnected")) => {
                ReconnectCause::Disconnected
            }
            _ => ReconnectCause::Other,
        }
    }
}
