use std::sync::Arc;

use qcon::{
    AppEvent, AuthEndpoint, ConsoleError, Credential, CredentialRequest, EventBus,
    RealtimeChannel, Request, SessionBroadcast, SessionEvent, SessionSnapshot,
};
use qcon_health::ConnectivityMonitor;

use crate::error::GatewayError;
use crate::gateway::RequestGateway;
use crate::store::TokenStore;

/// Login and logout: creates and destroys the credential the rest of the
/// core works with.
pub struct SessionManager {
    store: Arc<TokenStore>,
    auth: Arc<dyn AuthEndpoint>,
    channel: Arc<dyn RealtimeChannel>,
    broadcast: Arc<dyn SessionBroadcast>,
    gateway: Arc<RequestGateway>,
    monitor: Arc<ConnectivityMonitor>,
    bus: EventBus,
}

impl SessionManager {
    pub fn new(
        store: Arc<TokenStore>,
        auth: Arc<dyn AuthEndpoint>,
        channel: Arc<dyn RealtimeChannel>,
        broadcast: Arc<dyn SessionBroadcast>,
        gateway: Arc<RequestGateway>,
        monitor: Arc<ConnectivityMonitor>,
        bus: EventBus,
    ) -> Self {
        Self {
            store,
            auth,
            channel,
            broadcast,
            gateway,
            monitor,
            bus,
        }
    }

    /// Password login.
    ///
    /// # Errors
    /// Returns the endpoint's rejection; nothing is stored in that case.
    pub async fn login(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Arc<Credential>, ConsoleError> {
        let request = CredentialRequest::Password {
            username: username.into(),
            password: password.into(),
        };
        self.establish(request, false).await
    }

    /// Single sign-on login.
    ///
    /// # Errors
    /// Returns the endpoint's rejection; nothing is stored in that case.
    pub async fn login_sso(&self) -> Result<Arc<Credential>, ConsoleError> {
        self.establish(CredentialRequest::Sso, true).await
    }

    async fn establish(
        &self,
        request: CredentialRequest,
        is_sso: bool,
    ) -> Result<Arc<Credential>, ConsoleError> {
        let kind = request.kind();
        let grant = self.auth.exchange(request).await.inspect_err(|e| {
            tracing::warn!(kind, error = %e, "login rejected");
        })?;

        let credential = self.store.set(Credential::from_grant(grant, is_sso));
        tracing::info!(kind, user = %credential.username, "logged in");

        if let Err(e) = self.channel.close().await {
            tracing::warn!(error = %e, "closing stale realtime channel failed");
        }
        if let Err(e) = self.channel.open(&credential.token).await {
            tracing::warn!(error = %e, "opening realtime channel failed");
        }
        if let Err(e) = self
            .broadcast
            .broadcast(SessionEvent::LoggedIn, SessionSnapshot::from(&*credential))
            .await
        {
            tracing::warn!(error = %e, "login broadcast failed");
        }
        self.bus.publish(AppEvent::UserUpdated);
        Ok(credential)
    }

    /// Tell the server, then tear the session down locally whatever it said.
    ///
    /// # Errors
    /// Returns the logout request's failure, after local teardown.
    pub async fn logout(&self) -> Result<(), GatewayError> {
        let topic = self.gateway.config().logout_topic.clone();
        let outcome = match self.store.get() {
            Some(_) => self
                .gateway
                .send(&Request::new(topic, bytes::Bytes::new()))
                .await
                .map(|_| ()),
            None => Ok(()),
        };
        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "logout request failed");
        }

        self.store.clear();
        if let Err(e) = self.channel.close().await {
            tracing::warn!(error = %e, "closing realtime channel on logout failed");
        }
        self.monitor.reset();
        if let Err(e) = self
            .broadcast
            .broadcast(SessionEvent::LoggedOut, SessionSnapshot::default())
            .await
        {
            tracing::warn!(error = %e, "logout broadcast failed");
        }
        self.bus.publish(AppEvent::UserUnauthenticated);
        tracing::info!("logged out");
        outcome
    }
}
