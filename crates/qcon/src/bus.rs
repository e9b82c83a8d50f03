use tokio::sync::broadcast;

use crate::state::AppState;

/// Application-wide notifications.
///
/// Connectivity events carry no payload; consumers re-query the monitor and
/// the app state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    StatusChanged { from: AppState, to: AppState },
    ConnectivityChanged,
    /// Feature components should reload their data.
    RebootRequested,
    /// Hard disconnect: the link is gone or stayed degraded too long.
    Disconnected,
    UserUpdated,
    UserUnauthenticated,
}

/// Typed fan-out of [`AppEvent`]s. Cheap to clone; all clones share one channel.
///
/// Dropping a receiver unsubscribes it.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to every current subscriber. Having none is not an error.
    pub fn publish(&self, event: AppEvent) {
        let delivered = self.tx.send(event).unwrap_or(0);
        tracing::trace!(?event, delivered, "app event published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
