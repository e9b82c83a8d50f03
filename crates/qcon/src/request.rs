use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An outgoing business request.
///
/// The payload is opaque to the core. A replay after credential renewal
/// clones this value, so topic and payload are always the ones originally sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub topic: String,
    pub payload: Bytes,
}

impl Request {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Build a request whose payload is the JSON encoding of `body`.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn json<T: Serialize>(topic: impl Into<String>, body: &T) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_vec(body)?;
        Ok(Self::new(topic, payload))
    }
}

/// Application-level result code carried by every response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ResultCode {
    Success,
    Failed,
    NotAllowed,
    NotAuthenticated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub result_code: ResultCode,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Response {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            result_code: ResultCode::Success,
            data,
        }
    }

    pub fn with_code(result_code: ResultCode) -> Self {
        Self {
            result_code,
            data: serde_json::Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result_code == ResultCode::Success
    }
}

/// HTTP-level failure of a request. Status 0 is a network failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("request failed with status {status}")]
pub struct TransportFailure {
    pub status: u16,
    pub body: String,
}

impl TransportFailure {
    pub const UNAUTHORIZED: u16 = 401;
    pub const FORBIDDEN: u16 = 403;
    pub const REQUEST_TIMEOUT: u16 = 408;
    pub const NETWORK: u16 = 0;

    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Self::UNAUTHORIZED
    }

    /// A 408 or a network-level failure. These never trigger a token refresh.
    pub fn is_transient(&self) -> bool {
        matches!(self.status, Self::REQUEST_TIMEOUT | Self::NETWORK)
    }
}

/// The request/response primitive the gateway wraps.
#[async_trait]
pub trait RequestTransport: Send + Sync {
    /// Send `request` with `token` as bearer credential.
    async fn send(&self, request: &Request, token: &str) -> Result<Response, TransportFailure>;
}
