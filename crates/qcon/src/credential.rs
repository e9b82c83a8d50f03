use serde::{Deserialize, Serialize};

use crate::auth::AuthGrant;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenData {
    pub refresh_token: String,
    pub token: String,
}

impl std::fmt::Debug for RefreshTokenData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RefreshTokenData(..)")
    }
}

/// The active credential set of a session. Replaced wholesale, never patched.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub token: String,
    pub refresh_token_data: RefreshTokenData,
    #[serde(rename = "isSSO")]
    pub is_sso: bool,
    pub user_id: String,
    pub username: String,
}

impl Credential {
    pub fn from_grant(grant: AuthGrant, is_sso: bool) -> Self {
        Self {
            refresh_token_data: RefreshTokenData {
                refresh_token: grant.refresh_token,
                token: grant.token.clone(),
            },
            token: grant.token,
            is_sso,
            user_id: grant.user.id,
            username: grant.user.username,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("is_sso", &self.is_sso)
            .finish_non_exhaustive()
    }
}
