use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

use qcon::{ChannelEvent, ConsoleError, RealtimeChannel};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOp {
    Open(String),
    Close,
}

#[derive(Default)]
struct Inner {
    token: Option<String>,
    ops: Vec<ChannelOp>,
}

/// Realtime channel that records open/close calls and lets tests inject
/// the events a live socket would produce.
pub struct MemoryRealtimeChannel {
    inner: Mutex<Inner>,
    events: mpsc::Sender<ChannelEvent>,
}

impl MemoryRealtimeChannel {
    /// Create the channel and the receiving end of its event stream.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (events, rx) = mpsc::channel(capacity);
        let channel = Self {
            inner: Mutex::new(Inner::default()),
            events,
        };
        (channel, rx)
    }

    /// Deliver `event` as if the socket produced it.
    ///
    /// # Errors
    /// Fails if the event consumer is gone.
    pub async fn emit(&self, event: ChannelEvent) -> Result<(), ConsoleError> {
        self.events
            .send(event)
            .await
            .map_err(|e| ConsoleError::Channel(e.to_string()))
    }

    pub fn ops(&self) -> Vec<ChannelOp> {
        self.lock().ops.clone()
    }

    /// Token of the current connection, if open.
    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RealtimeChannel for MemoryRealtimeChannel {
    async fn open(&self, token: &str) -> Result<(), ConsoleError> {
        let mut inner = self.lock();
        if inner.token.as_deref() == Some(token) {
            return Ok(());
        }
        if inner.token.is_some() {
            return Err(ConsoleError::Channel(
                "already open with another token".to_string(),
            ));
        }
        inner.token = Some(token.to_string());
        inner.ops.push(ChannelOp::Open(token.to_string()));
        Ok(())
    }

    async fn close(&self) -> Result<(), ConsoleError> {
        let mut inner = self.lock();
        if inner.token.take().is_some() {
            inner.ops.push(ChannelOp::Close);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().token.is_some()
    }
}
