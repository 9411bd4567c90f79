//! Token source double holding bearer tokens in memory.

use crate::client_pool::{
    domain::ServerName,
    ports::{ClientError, ClientResult, TokenSource},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory OAuth token store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenSource {
    tokens: Arc<RwLock<BTreeMap<ServerName, String>>>,
}

impl InMemoryTokenSource {
    /// Creates an empty token store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the access token for `server`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when lock acquisition fails.
    pub fn set_token(&self, server: &ServerName, token: impl Into<String>) -> ClientResult<()> {
        self.tokens
            .write()
            .map_err(|err| ClientError::protocol(std::io::Error::other(err.to_string())))?
            .insert(server.clone(), token.into());
        Ok(())
    }
}

#[async_trait]
impl TokenSource for InMemoryTokenSource {
    async fn bearer_token(&self, server: &ServerName) -> ClientResult<Option<String>> {
        let tokens = self
            .tokens
            .read()
            .map_err(|err| ClientError::protocol(std::io::Error::other(err.to_string())))?;
        Ok(tokens.get(server).cloned())
    }
}
