//! OAuth bearer token lookup.

use super::ClientResult;
use crate::client_pool::domain::ServerName;
use async_trait::async_trait;

/// Supplies OAuth access tokens for remote servers.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns the current access token for `server`, if the user has
    /// authorized it.
    async fn bearer_token(&self, server: &ServerName) -> ClientResult<Option<String>>;
}
