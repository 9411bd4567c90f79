//! Backend client for always-on companion containers.

use super::StdioClient;
use crate::client_pool::{
    domain::{Handshake, ProcessLaunch, Root, ServerName},
    ports::{BackendClient, ClientResult, ProtocolConnector, ProtocolSession},
};
use async_trait::async_trait;
use std::sync::Arc;

const BRIDGE_PROGRAM: &str = "socat";
const COMPANION_PORT: u16 = 4444;

/// Client reaching a companion container `mcp-<name>` through a local
/// `socat` stdio-to-TCP bridge.
#[derive(Debug)]
pub struct StaticClient {
    bridge: StdioClient,
}

impl StaticClient {
    /// Creates a bridge client for `server`.
    #[must_use]
    pub fn new(server: ServerName, connector: Arc<dyn ProtocolConnector>) -> Self {
        let launch = ProcessLaunch {
            program: BRIDGE_PROGRAM.to_owned(),
            args: vec![
                "STDIO".to_owned(),
                format!("TCP:mcp-{server}:{COMPANION_PORT}"),
            ],
            env: Vec::new(),
        };
        Self {
            bridge: StdioClient::new(server, connector, launch),
        }
    }

    /// Returns the bridge process.
    #[must_use]
    pub const fn launch(&self) -> &ProcessLaunch {
        self.bridge.launch()
    }
}

#[async_trait]
impl BackendClient for StaticClient {
    fn server_name(&self) -> &ServerName {
        self.bridge.server_name()
    }

    async fn initialize(&self, handshake: &Handshake) -> ClientResult<()> {
        self.bridge.initialize(handshake).await
    }

    fn session(&self) -> ClientResult<Arc<dyn ProtocolSession>> {
        self.bridge.session()
    }

    async fn add_roots(&self, roots: Vec<Root>) -> ClientResult<()> {
        self.bridge.add_roots(roots).await
    }

    async fn close(&self) -> ClientResult<()> {
        self.bridge.close().await
    }
}
