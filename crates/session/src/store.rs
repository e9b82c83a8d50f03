use std::sync::{Arc, PoisonError, RwLock};

use qcon::Credential;

/// Holds the active credential. Writers swap the whole value, so a reader
/// always sees either the old or the new credential set.
#[derive(Debug, Default)]
pub struct TokenStore {
    current: RwLock<Option<Arc<Credential>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<Credential>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the credential. Returns the stored value.
    pub fn set(&self, credential: Credential) -> Arc<Credential> {
        let credential = Arc::new(credential);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
        credential
    }

    pub fn clear(&self) -> Option<Arc<Credential>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn token(&self) -> Option<String> {
        self.get().map(|c| c.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }
}
