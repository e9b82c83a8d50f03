use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use qcon::{Request, RequestTransport, Response, TransportFailure};

#[derive(Debug, Clone)]
pub struct MemoryTransportConfig {
    pub max_payload_size: usize,
}

impl Default for MemoryTransportConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 1_048_576, // 1MB
        }
    }
}

type Outcome = Result<Response, TransportFailure>;

#[derive(Default)]
struct Inner {
    scripted: HashMap<String, VecDeque<Outcome>>,
    expired: HashSet<String>,
    sent: Vec<(Request, String)>,
}

/// Request transport answering from per-topic scripts.
///
/// Unscripted topics succeed and echo the bearer token and topic in `data`.
/// Expired tokens are always answered with 401, before any script.
pub struct MemoryRequestTransport {
    config: MemoryTransportConfig,
    inner: Mutex<Inner>,
}

impl MemoryRequestTransport {
    #[must_use]
    pub fn new(config: MemoryTransportConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Queue `outcome` for the next request on `topic`.
    pub fn script(&self, topic: &str, outcome: Outcome) {
        self.lock()
            .scripted
            .entry(topic.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn expire_token(&self, token: &str) {
        self.lock().expired.insert(token.to_string());
    }

    /// Every request sent so far, with the bearer token it carried.
    pub fn sent(&self) -> Vec<(Request, String)> {
        self.lock().sent.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryRequestTransport {
    fn default() -> Self {
        Self::new(MemoryTransportConfig::default())
    }
}

#[async_trait]
impl RequestTransport for MemoryRequestTransport {
    async fn send(&self, request: &Request, token: &str) -> Result<Response, TransportFailure> {
        self.lock().sent.push((request.clone(), token.to_string()));
        // Let concurrent callers interleave like real round trips do.
        tokio::task::yield_now().await;

        if request.payload.len() > self.config.max_payload_size {
            return Err(TransportFailure::new(413, "payload too large"));
        }

        let mut inner = self.lock();
        if inner.expired.contains(token) {
            return Err(TransportFailure::new(401, "token expired"));
        }
        if let Some(outcome) = inner
            .scripted
            .get_mut(&request.topic)
            .and_then(VecDeque::pop_front)
        {
            return outcome;
        }
        Ok(Response::success(serde_json::json!({
            "topic": request.topic,
            "token": token,
        })))
    }
}
