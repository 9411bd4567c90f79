//! Teardown handle for a provisioned sandbox.

use super::SandboxError;
use super::rollback::Provisioned;
use crate::sandbox::ports::ContainerEngine;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Owns every container and network of one sandbox.
///
/// [`SandboxTeardown::run`] consumes the handle, so a sandbox is torn down
/// at most once. In keep-containers mode the sidecars are only stopped and
/// the networks stay in place.
#[must_use = "sandbox containers and networks leak unless the teardown runs"]
pub struct SandboxTeardown<E: ContainerEngine + 'static> {
    engine: Arc<E>,
    provisioned: Vec<Provisioned>,
    keep_containers: bool,
    log_follower: Option<JoinHandle<()>>,
}

impl<E: ContainerEngine + 'static> SandboxTeardown<E> {
    pub(super) fn new(
        engine: Arc<E>,
        provisioned: Vec<Provisioned>,
        keep_containers: bool,
        log_follower: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            engine,
            provisioned,
            keep_containers,
            log_follower,
        }
    }

    /// Returns whether there is nothing to tear down.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.provisioned.is_empty()
    }

    /// Returns the sidecar container names, oldest first.
    #[must_use]
    pub fn containers(&self) -> Vec<&str> {
        self.provisioned
            .iter()
            .filter_map(|resource| match resource {
                Provisioned::Container(name) => Some(name.as_str()),
                Provisioned::Network(_) => None,
            })
            .collect()
    }

    /// Returns the network names, oldest first.
    #[must_use]
    pub fn networks(&self) -> Vec<&str> {
        self.provisioned
            .iter()
            .filter_map(|resource| match resource {
                Provisioned::Network(name) => Some(name.as_str()),
                Provisioned::Container(_) => None,
            })
            .collect()
    }

    /// Stops or removes the sidecars, then removes the networks.
    ///
    /// Every step is attempted even when an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Teardown`] listing every failed step.
    pub async fn run(mut self) -> Result<(), SandboxError> {
        if let Some(follower) = self.log_follower.take() {
            follower.abort();
        }
        if self.provisioned.is_empty() {
            return Ok(());
        }

        let failures = if self.keep_containers {
            self.stop_sidecars().await
        } else {
            self.remove_all().await
        };

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SandboxError::Teardown(failures))
        }
    }

    async fn stop_sidecars(&self) -> Vec<SandboxError> {
        let containers = self.containers();
        info!(containers = %containers.join(", "), "stopping proxies");

        let mut failures = Vec::new();
        for name in containers {
            if let Err(source) = self.engine.stop_container(name, STOP_TIMEOUT).await {
                failures.push(SandboxError::StopContainer {
                    name: name.to_owned(),
                    source,
                });
            }
        }
        failures
    }

    async fn remove_all(&self) -> Vec<SandboxError> {
        info!(
            containers = %self.containers().join(", "),
            networks = %self.networks().join(", "),
            "removing proxies and networks"
        );

        let mut failures = Vec::new();
        for resource in self.provisioned.iter().rev() {
            let outcome = match resource {
                Provisioned::Container(name) => self
                    .engine
                    .remove_container(name, true)
                    .await
                    .map_err(|source| SandboxError::RemoveContainer {
                        name: name.clone(),
                        source,
                    }),
                Provisioned::Network(name) => {
                    self.engine
                        .remove_network(name)
                        .await
                        .map_err(|source| SandboxError::RemoveNetwork {
                            name: name.clone(),
                            source,
                        })
                }
            };
            if let Err(err) = outcome {
                failures.push(err);
            }
        }
        failures
    }
}

impl<E: ContainerEngine + 'static> fmt::Debug for SandboxTeardown<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SandboxTeardown")
            .field("containers", &self.containers())
            .field("networks", &self.networks())
            .field("keep_containers", &self.keep_containers)
            .finish_non_exhaustive()
    }
}
