//! The backend client capability shared by every connection kind.

use super::ProtocolSession;
use crate::client_pool::domain::{Handshake, Root, ServerName};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for backend client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// A connection to one backend server.
///
/// A client is initialized at most once. Root hints given before the
/// session exists are remembered and sent when it connects.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Returns the backend this client talks to.
    fn server_name(&self) -> &ServerName;

    /// Connects and performs the protocol handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadyInitialized`] on a second call, or
    /// [`ClientError::Connect`] when the backend cannot be reached.
    async fn initialize(&self, handshake: &Handshake) -> ClientResult<()>;

    /// Returns the live protocol session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotInitialized`] before a successful
    /// [`Self::initialize`] and [`ClientError::Closed`] after [`Self::close`].
    fn session(&self) -> ClientResult<Arc<dyn ProtocolSession>>;

    /// Replaces the root directory hints.
    ///
    /// # Errors
    ///
    /// Returns protocol errors when a live session rejects the update.
    async fn add_roots(&self, roots: Vec<Root>) -> ClientResult<()>;

    /// Closes the session and releases everything the client owns.
    ///
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] or [`ClientError::Cleanup`] when
    /// shutting down fails; the client is closed regardless.
    async fn close(&self) -> ClientResult<()>;
}

/// Errors returned by backend clients.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// [`BackendClient::initialize`] was called twice.
    #[error("client for {0} already initialized")]
    AlreadyInitialized(ServerName),

    /// The session was requested before initialization.
    #[error("client for {0} is not initialized")]
    NotInitialized(ServerName),

    /// The client has been closed.
    #[error("client for {0} is closed")]
    Closed(ServerName),

    /// Connecting to the backend failed.
    #[error("failed to connect to {server}: {source}")]
    Connect {
        /// Backend name.
        server: ServerName,
        /// Underlying failure.
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// A protocol exchange failed.
    #[error("protocol error: {0}")]
    Protocol(Arc<dyn std::error::Error + Send + Sync>),

    /// Releasing resources tied to the client failed.
    #[error("cleanup for {server} failed: {source}")]
    Cleanup {
        /// Backend name.
        server: ServerName,
        /// Underlying failure.
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl ClientError {
    /// Wraps a connection failure.
    pub fn connect(
        server: &ServerName,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connect {
            server: server.clone(),
            source: Arc::new(err),
        }
    }

    /// Wraps a protocol failure.
    pub fn protocol(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Protocol(Arc::new(err))
    }

    /// Wraps a cleanup failure.
    pub fn cleanup(
        server: &ServerName,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Cleanup {
            server: server.clone(),
            source: Arc::new(err),
        }
    }
}
