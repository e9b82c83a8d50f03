use async_trait::async_trait;
use tokio::sync::broadcast;

use qcon::{ConsoleError, CrossTabMessage, SessionBroadcast, SessionEvent, SessionSnapshot};

/// Shared medium standing in for browser storage events.
#[derive(Clone)]
pub struct MemoryBroadcastHub {
    tx: broadcast::Sender<CrossTabMessage>,
}

impl MemoryBroadcastHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// A new participant with a fresh ULID source id.
    #[must_use]
    pub fn tab(&self) -> MemoryTab {
        MemoryTab {
            tx: self.tx.clone(),
            source_id: format!("tab-{}", ulid::Ulid::new()),
        }
    }
}

impl Default for MemoryBroadcastHub {
    fn default() -> Self {
        Self::new(32)
    }
}

/// One participant on a [`MemoryBroadcastHub`].
pub struct MemoryTab {
    tx: broadcast::Sender<CrossTabMessage>,
    source_id: String,
}

#[async_trait]
impl SessionBroadcast for MemoryTab {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn broadcast(
        &self,
        event: SessionEvent,
        snapshot: SessionSnapshot,
    ) -> Result<(), ConsoleError> {
        let message = CrossTabMessage {
            event,
            snapshot,
            source_id: self.source_id.clone(),
        };
        // Nobody listening is fine: there may be no other tab.
        let delivered = self.tx.send(message).unwrap_or(0);
        tracing::debug!(%event, source = %self.source_id, delivered, "session broadcast");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<CrossTabMessage> {
        self.tx.subscribe()
    }
}
