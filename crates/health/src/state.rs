use std::sync::{Mutex, PoisonError};

use qcon::{AppErrorKind, AppEvent, AppState, EventBus};
use tokio::sync::watch;

use crate::error::HealthError;

/// Owns the top-level [`AppState`] and fans every change out on the bus.
///
/// The current state is also observable through [`watch`](Self::watch).
pub struct AppStateMachine {
    status: watch::Sender<AppState>,
    error: Mutex<Option<AppErrorKind>>,
    bus: EventBus,
}

impl AppStateMachine {
    pub fn new(bus: EventBus) -> Self {
        let (status, _) = watch::channel(AppState::Preparing);
        Self {
            status,
            error: Mutex::new(None),
            bus,
        }
    }

    pub fn status(&self) -> AppState {
        *self.status.borrow()
    }

    pub fn error_kind(&self) -> Option<AppErrorKind> {
        *self.error.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn watch(&self) -> watch::Receiver<AppState> {
        self.status.subscribe()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Move to `next`. Returns `Ok(false)` if already there.
    ///
    /// # Errors
    /// Returns `HealthError::InvalidTransition` if the state machine does not
    /// allow `current -> next`.
    pub fn set_status(
        &self,
        next: AppState,
        error: Option<AppErrorKind>,
    ) -> Result<bool, HealthError> {
        let mut from = next;
        let mut rejected = false;
        let changed = self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if !current.can_transition_to(next) {
                from = *current;
                rejected = true;
                return false;
            }
            from = *current;
            *current = next;
            true
        });

        if rejected {
            return Err(HealthError::InvalidTransition { from, to: next });
        }

        let error = if next == AppState::Error { error } else { None };
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = error;

        if changed {
            tracing::info!(%from, to = %next, "app status changed");
            self.bus.publish(AppEvent::StatusChanged { from, to: next });
        }
        Ok(changed)
    }

    /// Startup finished (captions and language loaded).
    pub fn initialization_complete(&self) {
        if let Err(e) = self.set_status(AppState::Ready, None) {
            tracing::warn!(error = %e, "initialization completed in unexpected state");
        }
    }

    /// Unrecoverable startup failure.
    pub fn fail(&self, kind: AppErrorKind) {
        if let Err(e) = self.set_status(AppState::Error, Some(kind)) {
            tracing::warn!(error = %e, ?kind, "could not enter error state");
        }
    }

    /// Connectivity verdict published by the monitor.
    ///
    /// Disconnected degrades `Ready` to `Connecting`. Connected while
    /// `Connecting` recovers to `Ready` and requests a reboot of feature data.
    /// Every call fans out `ConnectivityChanged`.
    pub fn connectivity_changed(&self, connected: bool) {
        let current = self.status();
        if connected {
            if current == AppState::Connecting {
                self.transition(AppState::Ready);
                self.bus.publish(AppEvent::RebootRequested);
            }
        } else if current == AppState::Ready {
            self.transition(AppState::Connecting);
        }
        self.bus.publish(AppEvent::ConnectivityChanged);
    }

    /// Degrade immediately, without waiting for health data.
    pub fn enter_connecting(&self) {
        if self.status() == AppState::Ready {
            self.transition(AppState::Connecting);
        }
        self.bus.publish(AppEvent::ConnectivityChanged);
    }

    /// Hard disconnect signal. Leaves the status as is.
    pub fn disconnect(&self) {
        tracing::warn!(status = %self.status(), "hard disconnect");
        self.bus.publish(AppEvent::Disconnected);
    }

    /// Forced reboot: back to `Ready` and reload feature data.
    pub fn reboot(&self) {
        if self.status() != AppState::Preparing {
            self.transition(AppState::Ready);
        }
        self.bus.publish(AppEvent::RebootRequested);
    }

    fn transition(&self, next: AppState) {
        if let Err(e) = self.set_status(next, None) {
            tracing::debug!(error = %e, "transition skipped");
        }
    }
}
