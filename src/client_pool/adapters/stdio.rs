//! Backend client for servers spawned as child processes.

use super::slot::SessionSlot;
use crate::client_pool::{
    domain::{BackendTransport, Handshake, ProcessLaunch, Root, ServerName},
    ports::{BackendClient, ClientResult, ProtocolConnector, ProtocolSession},
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Client that spawns a process and speaks the protocol over its stdio.
pub struct StdioClient {
    slot: SessionSlot,
    connector: Arc<dyn ProtocolConnector>,
    launch: ProcessLaunch,
}

impl StdioClient {
    /// Creates a client that will run `launch` when initialized.
    #[must_use]
    pub fn new(
        server: ServerName,
        connector: Arc<dyn ProtocolConnector>,
        launch: ProcessLaunch,
    ) -> Self {
        Self {
            slot: SessionSlot::new(server),
            connector,
            launch,
        }
    }

    /// Returns the process the client runs.
    #[must_use]
    pub const fn launch(&self) -> &ProcessLaunch {
        &self.launch
    }
}

#[async_trait]
impl BackendClient for StdioClient {
    fn server_name(&self) -> &ServerName {
        self.slot.server()
    }

    async fn initialize(&self, handshake: &Handshake) -> ClientResult<()> {
        debug!(
            server = %self.slot.server(),
            program = %self.launch.program,
            args = ?self.launch.args,
            "starting backend process"
        );
        let transport = BackendTransport::ChildProcess(self.launch.clone());
        self.slot
            .connect(&*self.connector, &transport, handshake)
            .await
    }

    fn session(&self) -> ClientResult<Arc<dyn ProtocolSession>> {
        self.slot.session()
    }

    async fn add_roots(&self, roots: Vec<Root>) -> ClientResult<()> {
        self.slot.set_roots(roots).await
    }

    async fn close(&self) -> ClientResult<()> {
        self.slot.close().await
    }
}

impl fmt::Debug for StdioClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StdioClient")
            .field("server", self.slot.server())
            .field("program", &self.launch.program)
            .field("args", &self.launch.args)
            .finish_non_exhaustive()
    }
}
