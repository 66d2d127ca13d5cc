//! Credential refresh trait.

use async_trait::async_trait;

use crate::error::RefreshError;
use crate::types::AccessToken;

/// Outcome of a successful refresh call.
#[derive(Debug, Clone)]
pub struct RefreshedSession {
    pub access_token: AccessToken,
    pub user: Option<serde_json::Value>,
}

/// Performs the raw refresh call.
///
/// Implementations must not go through the request pipeline: they use the
/// ambient refresh context (a cookie) and never attach the expiring token.
#[async_trait]
pub trait RefreshBackend: Send + Sync {
    /// Exchange the ambient refresh context for a new access token.
    async fn refresh(&self) -> Result<RefreshedSession, RefreshError>;
}
