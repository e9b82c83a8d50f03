use std::sync::Arc;

use qcon::{ReconnectCause, Request, RequestTransport, Response, ResultCode, TransportFailure};
use qcon_health::ConnectivityMonitor;

use crate::error::GatewayError;
use crate::refresher::TokenRefresher;
use crate::store::TokenStore;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Topic of the logout request. Its failures never trigger a refresh.
    pub logout_topic: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            logout_topic: "logout".to_string(),
        }
    }
}

/// Issues authenticated requests and hides credential renewal from callers.
///
/// A 401 is answered by one refresh and exactly one replay of the same
/// request. Timeouts and network failures go to the connectivity monitor
/// instead and are handed back to the caller.
pub struct RequestGateway {
    config: GatewayConfig,
    transport: Arc<dyn RequestTransport>,
    store: Arc<TokenStore>,
    refresher: Arc<TokenRefresher>,
    monitor: Arc<ConnectivityMonitor>,
}

impl RequestGateway {
    pub fn new(
        config: GatewayConfig,
        transport: Arc<dyn RequestTransport>,
        store: Arc<TokenStore>,
        refresher: Arc<TokenRefresher>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            refresher,
            monitor,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Send `request` with the current credential.
    ///
    /// # Errors
    /// See [`GatewayError`]. A refresh that succeeded is invisible: the
    /// caller gets the replayed request's outcome.
    pub async fn send(&self, request: &Request) -> Result<Response, GatewayError> {
        let credential = self.store.get().ok_or(GatewayError::NotAuthenticated)?;

        let failure = match self.transport.send(request, &credential.token).await {
            Ok(response) => return self.accept(request, response),
            Err(failure) => failure,
        };

        if failure.is_unauthorized() && !self.is_logout(request) {
            tracing::debug!(topic = %request.topic, "401, renewing credential");
            let fresh = self.refresher.recover(&credential.token).await?;
            return match self.transport.send(request, &fresh.token).await {
                Ok(response) => self.accept(request, response),
                // No second refresh for the replay.
                Err(failure) if failure.is_unauthorized() => Err(GatewayError::NotAuthenticated),
                Err(failure) => Err(self.reject(request, failure)),
            };
        }

        Err(self.reject(request, failure))
    }

    fn accept(&self, request: &Request, response: Response) -> Result<Response, GatewayError> {
        if response.result_code == ResultCode::NotAllowed {
            tracing::info!(topic = %request.topic, "request not allowed");
            return Err(GatewayError::NotAllowed {
                topic: request.topic.clone(),
            });
        }
        Ok(response)
    }

    fn reject(&self, request: &Request, failure: TransportFailure) -> GatewayError {
        match failure.status {
            TransportFailure::REQUEST_TIMEOUT => {
                tracing::warn!(topic = %request.topic, "request timed out");
                self.monitor.handle_reconnect(ReconnectCause::Timeout);
                GatewayError::Timeout
            }
            TransportFailure::NETWORK => {
                tracing::warn!(topic = %request.topic, "network failure");
                self.monitor.handle_reconnect(ReconnectCause::Timeout);
                GatewayError::Network
            }
            status if self.is_logout(request) => GatewayError::Unauthorized { status },
            TransportFailure::FORBIDDEN => GatewayError::NotAllowed {
                topic: request.topic.clone(),
            },
            TransportFailure::UNAUTHORIZED => GatewayError::NotAuthenticated,
            status => GatewayError::Http {
                status,
                body: failure.body,
            },
        }
    }

    fn is_logout(&self, request: &Request) -> bool {
        request.topic == self.config.logout_topic
    }
}
