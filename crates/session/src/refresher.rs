use std::sync::Arc;

use qcon::{
    AppEvent, AuthEndpoint, Credential, CredentialRequest, EventBus, RealtimeChannel,
    RefreshTokenData, SessionBroadcast, SessionEvent, SessionSnapshot,
};
use tokio::sync::Mutex;

use crate::error::RefreshError;
use crate::store::TokenStore;

/// Serializes credential renewal after a 401.
///
/// Concurrent callers queue behind one renewal; a caller whose failed token
/// was already replaced gets the newer credential without a second exchange.
pub struct TokenRefresher {
    store: Arc<TokenStore>,
    auth: Arc<dyn AuthEndpoint>,
    channel: Arc<dyn RealtimeChannel>,
    broadcast: Arc<dyn SessionBroadcast>,
    bus: EventBus,
    gate: Mutex<()>,
}

impl TokenRefresher {
    pub fn new(
        store: Arc<TokenStore>,
        auth: Arc<dyn AuthEndpoint>,
        channel: Arc<dyn RealtimeChannel>,
        broadcast: Arc<dyn SessionBroadcast>,
        bus: EventBus,
    ) -> Self {
        Self {
            store,
            auth,
            channel,
            broadcast,
            bus,
            gate: Mutex::new(()),
        }
    }

    /// Renew the credential that produced a 401 with `failed_token`.
    ///
    /// SSO sessions re-run the handshake; others exchange their refresh token.
    ///
    /// # Errors
    /// `NoCredential` if the session is gone, `Rejected` if the refresh token
    /// was refused (terminal), `Sso` if the handshake failed.
    pub async fn recover(&self, failed_token: &str) -> Result<Arc<Credential>, RefreshError> {
        let _guard = self.gate.lock().await;
        let current = self.store.get().ok_or(RefreshError::NoCredential)?;

        if current.token != failed_token {
            tracing::debug!(user = %current.username, "credential already renewed");
            return Ok(current);
        }

        if current.is_sso {
            self.reauthenticate_sso().await
        } else {
            self.exchange_refresh_token(&current.refresh_token_data).await
        }
    }

    /// Exchange `data` for a new token pair.
    ///
    /// # Errors
    /// `Rejected` if the endpoint refuses the refresh token; the session is
    /// cleared and `UserUnauthenticated` published.
    pub async fn refresh_token(
        &self,
        data: &RefreshTokenData,
    ) -> Result<Arc<Credential>, RefreshError> {
        let _guard = self.gate.lock().await;
        self.exchange_refresh_token(data).await
    }

    async fn exchange_refresh_token(
        &self,
        data: &RefreshTokenData,
    ) -> Result<Arc<Credential>, RefreshError> {
        // The old socket must not outlive the old token.
        if let Err(e) = self.channel.close().await {
            tracing::warn!(error = %e, "closing realtime channel before refresh failed");
        }

        let grant = match self.auth.exchange(CredentialRequest::Refresh(data.clone())).await {
            Ok(grant) => grant,
            Err(e) => {
                tracing::warn!(error = %e, "refresh token rejected, ending session");
                self.store.clear();
                self.bus.publish(AppEvent::UserUnauthenticated);
                return Err(RefreshError::Rejected(e));
            }
        };

        let credential = self.store.set(Credential::from_grant(grant, false));
        tracing::info!(user = %credential.username, "access token refreshed");

        if let Err(e) = self.channel.open(&credential.token).await {
            tracing::warn!(error = %e, "reopening realtime channel after refresh failed");
        }
        if let Err(e) = self
            .broadcast
            .broadcast(SessionEvent::TokenRefreshed, SessionSnapshot::from(&*credential))
            .await
        {
            tracing::warn!(error = %e, "token refresh broadcast failed");
        }
        self.bus.publish(AppEvent::UserUpdated);
        Ok(credential)
    }

    async fn reauthenticate_sso(&self) -> Result<Arc<Credential>, RefreshError> {
        match self.auth.exchange(CredentialRequest::Sso).await {
            Ok(grant) => {
                let credential = self.store.set(Credential::from_grant(grant, true));
                tracing::info!(user = %credential.username, "sso session renewed");
                self.bus.publish(AppEvent::UserUpdated);
                Ok(credential)
            }
            Err(e) => {
                tracing::warn!(error = %e, "sso re-authentication failed");
                Err(RefreshError::Sso(e))
            }
        }
    }
}
