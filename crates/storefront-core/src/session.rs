//! In-process session state.

use std::sync::{PoisonError, RwLock};

use crate::traits::SessionStore;
use crate::types::AccessToken;

/// Session store backed by process memory.
///
/// # Example
///
/// ```
/// use storefront_core::{AccessToken, MemorySessionStore, SessionStore};
///
/// let store = MemorySessionStore::new();
/// assert!(store.get().is_none());
///
/// store.set(AccessToken::new("token"));
/// assert_eq!(store.get().unwrap().as_str(), "token");
///
/// store.clear();
/// assert!(store.get().is_none());
/// ```
#[derive(Default)]
pub struct MemorySessionStore {
    state: RwLock<SessionSnapshot>,
}

#[derive(Default, Clone)]
struct SessionSnapshot {
    access_token: Option<AccessToken>,
    user: Option<serde_json::Value>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding an existing session, e.g. one restored from disk.
    pub fn with_session(access_token: AccessToken, user: Option<serde_json::Value>) -> Self {
        Self {
            state: RwLock::new(SessionSnapshot {
                access_token: Some(access_token),
                user,
            }),
        }
    }
}

// A poisoned lock still holds a consistent snapshot: writers only assign whole fields.
impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<AccessToken> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .clone()
    }

    fn set(&self, token: AccessToken) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token = Some(token);
    }

    fn clear(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = SessionSnapshot::default();
    }

    fn user(&self) -> Option<serde_json::Value> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    fn set_user(&self, user: serde_json::Value) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .user = Some(user);
    }
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let logged_in = self.get().is_some();
        f.debug_struct("MemorySessionStore")
            .field("logged_in", &logged_in)
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}
