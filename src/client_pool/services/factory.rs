//! Builds concrete backend clients from descriptors.

use super::sandboxed::SandboxedClient;
use super::{ClientPoolError, ContainerLaunchPlan, TemplateRenderer};
use crate::client_pool::{
    adapters::{ProcessToolRunner, RemoteClient, StaticClient, StdioClient},
    domain::{
        ContainerLaunch, PoolOptions, RemoteEndpoint, ServerDescriptor, ServerKind,
        SessionConfig,
    },
    ports::{BackendClient, ProtocolConnector, TokenSource, ToolRunner},
};
use crate::sandbox::{ports::ContainerEngine, services::SandboxOrchestrator};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

#[derive(Default)]
struct FactorySettings {
    networks: Vec<String>,
    token_source: Option<Arc<dyn TokenSource>>,
    tool_runner: Option<Arc<dyn ToolRunner>>,
}

/// Shared inputs for client creation: options, the sandbox orchestrator,
/// the protocol connector and the runtime-adjustable settings.
pub(super) struct ClientFactory<E: ContainerEngine + 'static> {
    options: PoolOptions,
    orchestrator: SandboxOrchestrator<E>,
    connector: Arc<dyn ProtocolConnector>,
    renderer: TemplateRenderer,
    settings: RwLock<FactorySettings>,
}

impl<E: ContainerEngine + 'static> ClientFactory<E> {
    pub(super) fn new(
        options: PoolOptions,
        orchestrator: SandboxOrchestrator<E>,
        connector: Arc<dyn ProtocolConnector>,
    ) -> Self {
        let settings = FactorySettings {
            networks: options.networks.clone(),
            token_source: None,
            tool_runner: None,
        };
        Self {
            options,
            orchestrator,
            connector,
            renderer: TemplateRenderer::new(),
            settings: RwLock::new(settings),
        }
    }

    pub(super) const fn options(&self) -> &PoolOptions {
        &self.options
    }

    pub(super) fn set_networks(&self, networks: Vec<String>) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .networks = networks;
    }

    pub(super) fn networks(&self) -> Vec<String> {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .networks
            .clone()
    }

    pub(super) fn set_token_source(&self, token_source: Arc<dyn TokenSource>) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .token_source = Some(token_source);
    }

    pub(super) const fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    pub(super) fn set_tool_runner(&self, tool_runner: Arc<dyn ToolRunner>) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .tool_runner = Some(tool_runner);
    }

    /// Returns the configured tool runner, or one driving the engine CLI.
    pub(super) fn tool_runner(&self) -> Arc<dyn ToolRunner> {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tool_runner
            .clone()
            .unwrap_or_else(|| Arc::new(ProcessToolRunner))
    }

    fn token_source(&self) -> Option<Arc<dyn TokenSource>> {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token_source
            .clone()
    }

    /// Builds an uninitialized client for `descriptor`.
    ///
    /// Remote servers and static companions never get a sandbox.
    /// Container-backed servers with an allow-list are sandboxed first and
    /// the returned client tears the sandbox down when closed.
    pub(super) async fn build(
        &self,
        descriptor: &ServerDescriptor,
        session: &SessionConfig,
    ) -> Result<Arc<dyn BackendClient>, ClientPoolError> {
        match descriptor.kind() {
            ServerKind::Remote(endpoint) => Ok(self.remote_client(descriptor, endpoint)),
            ServerKind::Static => Ok(self.static_client(descriptor)),
            ServerKind::Container(_) if self.options.static_mode => {
                Ok(self.static_client(descriptor))
            }
            ServerKind::Container(launch) => {
                self.container_client(descriptor, launch, session).await
            }
        }
    }

    fn remote_client(
        &self,
        descriptor: &ServerDescriptor,
        endpoint: &RemoteEndpoint,
    ) -> Arc<dyn BackendClient> {
        let client = RemoteClient::new(descriptor, endpoint.clone(), Arc::clone(&self.connector));
        match self.token_source() {
            Some(source) => Arc::new(client.with_token_source(source)),
            None => Arc::new(client),
        }
    }

    fn static_client(&self, descriptor: &ServerDescriptor) -> Arc<dyn BackendClient> {
        Arc::new(StaticClient::new(
            descriptor.name().clone(),
            Arc::clone(&self.connector),
        ))
    }

    async fn container_client(
        &self,
        descriptor: &ServerDescriptor,
        launch: &ContainerLaunch,
        session: &SessionConfig,
    ) -> Result<Arc<dyn BackendClient>, ClientPoolError> {
        let sandbox = self
            .orchestrator
            .provision_allow_list(descriptor.allow_hosts())
            .await
            .map_err(|source| ClientPoolError::Sandbox {
                server: descriptor.name().clone(),
                source,
            })?;
        let (target, teardown) = sandbox.into_parts();

        let composed = ContainerLaunchPlan::compose(
            descriptor,
            launch,
            &self.options,
            &self.networks(),
            &target,
            session.read_only(),
            &self.renderer,
        );
        let plan = match composed {
            Ok(plan) => plan,
            Err(err) => {
                if let Err(cleanup) = teardown.run().await {
                    warn!(server = %descriptor.name(), error = %cleanup, "sandbox teardown failed");
                }
                return Err(err);
            }
        };

        info!(
            server = %descriptor.name(),
            image = %launch.image(),
            args = ?plan.args(),
            sandboxed = target.is_sandboxed(),
            "running backend container"
        );
        let client = Arc::new(StdioClient::new(
            descriptor.name().clone(),
            Arc::clone(&self.connector),
            plan.into_process(),
        ));
        if teardown.is_empty() {
            return Ok(client);
        }
        Ok(Arc::new(SandboxedClient::new(client, teardown)))
    }
}
