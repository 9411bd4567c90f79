//! Seam to the protocol implementation that frames and exchanges messages.

use super::ClientResult;
use crate::client_pool::domain::{BackendTransport, Handshake, Root, ServerName};
use async_trait::async_trait;
use std::sync::Arc;

/// An established protocol session with one backend.
#[async_trait]
pub trait ProtocolSession: Send + Sync {
    /// Sends a request and waits for its result.
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> ClientResult<serde_json::Value>;

    /// Announces the current root directories to the backend.
    async fn set_roots(&self, roots: &[Root]) -> ClientResult<()>;

    /// Ends the session, terminating the backend process if one was spawned.
    async fn close(&self) -> ClientResult<()>;
}

/// Opens protocol sessions over a resolved transport.
#[async_trait]
pub trait ProtocolConnector: Send + Sync {
    /// Establishes a transport, performs the `initialize` exchange and
    /// announces `roots`.
    ///
    /// # Errors
    ///
    /// Returns [`super::ClientError::Connect`] when the transport cannot be
    /// opened or the handshake is rejected.
    async fn connect(
        &self,
        server: &ServerName,
        transport: &BackendTransport,
        handshake: &Handshake,
        roots: &[Root],
    ) -> ClientResult<Arc<dyn ProtocolSession>>;
}
