//! Session state trait.

use crate::types::AccessToken;

/// Process-wide holder of the current access credential.
///
/// Reads happen on every request; writes come from the refresh coordinator
/// and from explicit login/logout calls. Implementations must be safe to call
/// concurrently and must not block on I/O.
pub trait SessionStore: Send + Sync {
    /// Returns the current access token, if logged in.
    fn get(&self) -> Option<AccessToken>;

    /// Replace the access token.
    fn set(&self, token: AccessToken);

    /// Drop the access token and any associated user profile.
    fn clear(&self);

    /// Returns the stored user profile, if any.
    fn user(&self) -> Option<serde_json::Value> {
        None
    }

    /// Replace the stored user profile.
    fn set_user(&self, _user: serde_json::Value) {}
}
