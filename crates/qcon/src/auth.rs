use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credential::RefreshTokenData;
use crate::error::ConsoleError;

/// What is being exchanged at the authentication endpoint.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialRequest {
    Password { username: String, password: String },
    /// Single sign-on handshake. The identity provider supplies the user.
    Sso,
    Refresh(RefreshTokenData),
}

impl CredentialRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::Sso => "sso",
            Self::Refresh(_) => "refresh",
        }
    }
}

impl std::fmt::Debug for CredentialRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Sso => f.write_str("Sso"),
            Self::Refresh(_) => f.write_str("Refresh(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
}

/// Successful exchange result. Same shape for password, SSO and refresh flows.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthGrant {
    pub user: AuthUser,
    pub token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for AuthGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGrant")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Authentication endpoint used for login and for credential renewal.
#[async_trait]
pub trait AuthEndpoint: Send + Sync {
    /// Exchange `request` for a new token pair.
    /// A rejection is reported as `ConsoleError::Exchange` with the endpoint's code.
    async fn exchange(&self, request: CredentialRequest) -> Result<AuthGrant, ConsoleError>;
}
