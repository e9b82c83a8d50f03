use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use qcon::{AuthEndpoint, AuthGrant, AuthUser, ConsoleError, CredentialRequest};

#[derive(Default)]
struct Inner {
    issued: u64,
    failures: VecDeque<String>,
    requests: Vec<CredentialRequest>,
}

/// Authentication endpoint issuing `token-{n}` / `refresh-{n}` pairs.
///
/// Queued failure codes are returned, one per exchange, before any grant.
#[derive(Default)]
pub struct MemoryAuthEndpoint {
    inner: Mutex<Inner>,
}

impl MemoryAuthEndpoint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, code: &str) {
        self.lock().failures.push_back(code.to_string());
    }

    pub fn requests(&self) -> Vec<CredentialRequest> {
        self.lock().requests.clone()
    }

    pub fn exchange_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AuthEndpoint for MemoryAuthEndpoint {
    async fn exchange(&self, request: CredentialRequest) -> Result<AuthGrant, ConsoleError> {
        let username = match &request {
            CredentialRequest::Password { username, .. } => username.clone(),
            CredentialRequest::Sso | CredentialRequest::Refresh(_) => "operator".to_string(),
        };
        tracing::debug!(kind = request.kind(), "memory auth exchange");
        self.lock().requests.push(request);
        tokio::task::yield_now().await;

        let mut inner = self.lock();
        if let Some(code) = inner.failures.pop_front() {
            return Err(ConsoleError::exchange(code));
        }
        inner.issued += 1;
        let n = inner.issued;
        Ok(AuthGrant {
            user: AuthUser {
                id: format!("user-{username}"),
                username,
            },
            token: format!("token-{n}"),
            refresh_token: format!("refresh-{n}"),
        })
    }
}
