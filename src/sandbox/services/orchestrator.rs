//! Network proxy orchestration for sandboxed backends.

use super::dns::start_dns_forwarder;
use super::l4::start_l4_proxies;
use super::l7::start_l7_proxy;
use super::naming::SandboxNetworks;
use super::readiness::{ReadinessPolicy, wait_all_running};
use super::rollback::Rollback;
use super::{NetworkScope, SandboxError, SandboxTeardown};
use crate::sandbox::{
    domain::{Proxy, ProxyProtocol, SandboxOptions, TargetConfig},
    ports::{ContainerEngine, NetworkSpec},
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A provisioned sandbox: how to attach the backend, and how to take the
/// topology down again.
pub struct Sandbox<E: ContainerEngine + 'static> {
    target: TargetConfig,
    teardown: SandboxTeardown<E>,
}

impl<E: ContainerEngine + 'static> Sandbox<E> {
    /// Returns the attachment instructions for the backend container.
    #[must_use]
    pub const fn target(&self) -> &TargetConfig {
        &self.target
    }

    /// Returns the teardown handle.
    #[must_use]
    pub const fn teardown(&self) -> &SandboxTeardown<E> {
        &self.teardown
    }

    /// Splits the sandbox into its target configuration and teardown handle.
    pub fn into_parts(self) -> (TargetConfig, SandboxTeardown<E>) {
        (self.target, self.teardown)
    }
}

impl<E: ContainerEngine + 'static> fmt::Debug for Sandbox<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Sandbox")
            .field("target", &self.target)
            .field("teardown", &self.teardown)
            .finish()
    }
}

/// Stands up the internal network, proxies and optional DNS forwarder that
/// confine a backend container to its egress allow-list.
pub struct SandboxOrchestrator<E: ContainerEngine + 'static> {
    engine: Arc<E>,
    options: SandboxOptions,
    readiness: ReadinessPolicy,
}

impl<E: ContainerEngine + 'static> SandboxOrchestrator<E> {
    /// Creates an orchestrator driving `engine`.
    #[must_use]
    pub fn new(engine: Arc<E>, options: SandboxOptions) -> Self {
        Self {
            engine,
            options,
            readiness: ReadinessPolicy::default(),
        }
    }

    /// Replaces the readiness poll budget.
    #[must_use]
    pub const fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    /// Returns the provisioning options.
    #[must_use]
    pub const fn options(&self) -> &SandboxOptions {
        &self.options
    }

    /// Returns the container engine.
    #[must_use]
    pub const fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Parses every entry of an allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::InvalidSpec`] for the first malformed entry.
    pub fn parse_allow_list<S: AsRef<str>>(allow_list: &[S]) -> Result<Vec<Proxy>, SandboxError> {
        allow_list
            .iter()
            .map(|spec| Proxy::parse(spec.as_ref()).map_err(SandboxError::from))
            .collect()
    }

    /// Parses an allow-list and provisions a sandbox for it.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::InvalidSpec`] before anything is created when
    /// an entry is malformed, otherwise whatever [`Self::provision`] returns.
    pub async fn provision_allow_list<S: AsRef<str>>(
        &self,
        allow_list: &[S],
    ) -> Result<Sandbox<E>, SandboxError> {
        let proxies = Self::parse_allow_list(allow_list)?;
        self.provision(&proxies).await
    }

    /// Provisions a sandbox allowing egress to `proxies` only.
    ///
    /// An empty list yields an unconfined target and an empty teardown.
    /// Any failure removes what this call created, newest first, unless
    /// containers are being kept for inspection.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError`] naming the network or container whose
    /// creation, start or readiness check failed.
    pub async fn provision(&self, proxies: &[Proxy]) -> Result<Sandbox<E>, SandboxError> {
        let keep = self.options.keep_containers;
        if proxies.is_empty() {
            return Ok(Sandbox {
                target: TargetConfig::default(),
                teardown: SandboxTeardown::new(Arc::clone(&self.engine), Vec::new(), keep, None),
            });
        }

        let networks = SandboxNetworks::generate();
        let mut rollback = Rollback::new(Arc::clone(&self.engine), keep);
        let outcome = self.provision_into(&mut rollback, &networks, proxies).await;
        match outcome {
            Ok((target, log_follower)) => {
                info!(
                    network = %networks.internal,
                    links = target.links().len(),
                    dns = ?target.dns(),
                    "sandbox ready"
                );
                let teardown = SandboxTeardown::new(
                    Arc::clone(&self.engine),
                    rollback.commit(),
                    keep,
                    log_follower,
                );
                Ok(Sandbox { target, teardown })
            }
            Err(err) => {
                debug!(network = %networks.internal, error = %err, "sandbox provisioning failed");
                rollback.unwind().await;
                Err(err)
            }
        }
    }

    async fn provision_into(
        &self,
        rollback: &mut Rollback<E>,
        networks: &SandboxNetworks,
        proxies: &[Proxy],
    ) -> Result<(TargetConfig, Option<JoinHandle<()>>), SandboxError> {
        self.create_network(rollback, NetworkScope::Internal, &networks.internal)
            .await?;
        self.create_network(rollback, NetworkScope::External, &networks.external)
            .await?;

        let mut target = TargetConfig::for_network(networks.internal.clone());
        let (tcp, http): (Vec<&Proxy>, Vec<&Proxy>) = proxies
            .iter()
            .partition(|proxy| proxy.protocol() == ProxyProtocol::Tcp);

        let mut sidecars = start_l4_proxies(
            &*self.engine,
            rollback,
            &mut target,
            networks,
            &tcp,
            &self.options,
        )
        .await?;
        if let Some(l7) = start_l7_proxy(
            &*self.engine,
            rollback,
            &mut target,
            networks,
            &http,
            &self.options,
        )
        .await?
        {
            sidecars.push(l7);
        }

        wait_all_running(&self.engine, &sidecars, self.readiness).await?;

        let log_follower = if self.options.debug_dns {
            Some(
                start_dns_forwarder(
                    &self.engine,
                    rollback,
                    &mut target,
                    networks,
                    &self.options,
                    self.readiness,
                )
                .await?,
            )
        } else {
            None
        };

        Ok((target, log_follower))
    }

    async fn create_network(
        &self,
        rollback: &mut Rollback<E>,
        scope: NetworkScope,
        name: &str,
    ) -> Result<(), SandboxError> {
        info!(network = name, %scope, "creating sandbox network");
        let spec = NetworkSpec {
            name: name.to_owned(),
            internal: scope == NetworkScope::Internal,
            labels: BTreeMap::from([("toolgate".to_owned(), "true".to_owned())]),
        };
        match self.engine.create_network(&spec).await {
            Ok(()) => {
                rollback.track_network(name);
                Ok(())
            }
            // Someone else owns an existing external network; leave it alone.
            Err(err) if err.is_conflict() && scope == NetworkScope::External => {
                debug!(network = name, "external network already exists");
                Ok(())
            }
            Err(source) => Err(SandboxError::CreateNetwork {
                scope,
                name: name.to_owned(),
                source,
            }),
        }
    }
}

impl<E: ContainerEngine + 'static> Clone for SandboxOrchestrator<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            options: self.options.clone(),
            readiness: self.readiness,
        }
    }
}

impl<E: ContainerEngine + 'static> fmt::Debug for SandboxOrchestrator<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SandboxOrchestrator")
            .field("options", &self.options)
            .field("readiness", &self.readiness)
            .finish_non_exhaustive()
    }
}
