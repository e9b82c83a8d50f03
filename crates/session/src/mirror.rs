use std::sync::Arc;

use qcon::{AppEvent, CrossTabMessage, EventBus, SessionEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::store::TokenStore;

/// Applies session changes published by other tabs to the local store.
/// Messages from this tab's own source id are ignored.
pub struct SessionMirror {
    store: Arc<TokenStore>,
    bus: EventBus,
    source_id: String,
}

impl SessionMirror {
    pub fn new(store: Arc<TokenStore>, bus: EventBus, source_id: impl Into<String>) -> Self {
        Self {
            store,
            bus,
            source_id: source_id.into(),
        }
    }

    /// Apply one message. Returns whether it changed local state.
    pub fn apply(&self, message: CrossTabMessage) -> bool {
        if message.source_id == self.source_id {
            return false;
        }
        match message.event {
            SessionEvent::LoggedIn | SessionEvent::TokenRefreshed => {
                let Some(credential) = message.snapshot.credential else {
                    tracing::warn!(event = %message.event, source = %message.source_id, "session message without credential");
                    return false;
                };
                if self.store.get().is_some_and(|c| *c == credential) {
                    return false;
                }
                self.store.set(credential);
                tracing::info!(event = %message.event, source = %message.source_id, "session mirrored from other tab");
                self.bus.publish(AppEvent::UserUpdated);
                true
            }
            SessionEvent::LoggedOut => {
                if self.store.clear().is_none() {
                    return false;
                }
                tracing::info!(source = %message.source_id, "logged out by other tab");
                self.bus.publish(AppEvent::UserUnauthenticated);
                true
            }
        }
    }

    /// Consume `messages` until cancelled or the broadcast closes.
    pub async fn run(
        self,
        mut messages: broadcast::Receiver<CrossTabMessage>,
        token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                received = messages.recv() => match received {
                    Ok(message) => {
                        self.apply(message);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session mirror lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        tracing::debug!("session mirror stopped");
    }
}
