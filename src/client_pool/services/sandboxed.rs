//! Client wrapper that owns a sandbox.

use crate::client_pool::{
    domain::{Handshake, Root, ServerName},
    ports::{BackendClient, ClientError, ClientResult, ProtocolSession},
};
use crate::sandbox::{ports::ContainerEngine, services::SandboxTeardown};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Backend client whose close also removes its proxies and networks.
pub(super) struct SandboxedClient<E: ContainerEngine + 'static> {
    inner: Arc<dyn BackendClient>,
    teardown: Mutex<Option<SandboxTeardown<E>>>,
}

impl<E: ContainerEngine + 'static> SandboxedClient<E> {
    pub(super) fn new(inner: Arc<dyn BackendClient>, teardown: SandboxTeardown<E>) -> Self {
        Self {
            inner,
            teardown: Mutex::new(Some(teardown)),
        }
    }
}

#[async_trait]
impl<E: ContainerEngine + 'static> BackendClient for SandboxedClient<E> {
    fn server_name(&self) -> &ServerName {
        self.inner.server_name()
    }

    async fn initialize(&self, handshake: &Handshake) -> ClientResult<()> {
        self.inner.initialize(handshake).await
    }

    fn session(&self) -> ClientResult<Arc<dyn ProtocolSession>> {
        self.inner.session()
    }

    async fn add_roots(&self, roots: Vec<Root>) -> ClientResult<()> {
        self.inner.add_roots(roots).await
    }

    async fn close(&self) -> ClientResult<()> {
        let closed = self.inner.close().await;
        let Some(teardown) = self.teardown.lock().await.take() else {
            return closed;
        };
        // The backend goes first so nothing holds the networks open.
        let removed = teardown
            .run()
            .await
            .map_err(|err| ClientError::cleanup(self.inner.server_name(), err));
        match (closed, removed) {
            (Err(err), Err(cleanup)) => {
                warn!(server = %self.inner.server_name(), error = %cleanup, "sandbox teardown failed");
                Err(err)
            }
            (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
            (Ok(()), Ok(())) => Ok(()),
        }
    }
}
