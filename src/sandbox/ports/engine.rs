//! Container engine port used by the sandbox orchestrator.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for container engine operations.
pub type ContainerEngineResult<T> = Result<T, ContainerEngineError>;

/// Stream of log lines read from a container.
pub type LogStream = BoxStream<'static, ContainerEngineResult<String>>;

/// Request to create a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    /// Network name.
    pub name: String,
    /// Whether the network is cut off from the outside world.
    pub internal: bool,
    /// Labels attached to the network.
    pub labels: BTreeMap<String, String>,
}

/// Request to create and start a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// `NAME=value` environment entries.
    pub env: Vec<String>,
    /// Labels attached to the container.
    pub labels: BTreeMap<String, String>,
    /// Networks to join. The first one is the primary network.
    pub networks: Vec<String>,
    /// Whether the engine deletes the container once it stops.
    pub auto_remove: bool,
}

/// Observed container state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerInspection {
    /// Whether the container is running.
    pub running: bool,
    /// Address of the container on each network it joined.
    pub addresses: BTreeMap<String, IpAddr>,
}

impl ContainerInspection {
    /// Returns the container address on `network`.
    #[must_use]
    pub fn address_on(&self, network: &str) -> Option<IpAddr> {
        self.addresses.get(network).copied()
    }
}

/// Capability set the sandbox needs from a container engine.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Creates a network.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerEngineError::Conflict`] when a network with the
    /// same name already exists.
    async fn create_network(&self, spec: &NetworkSpec) -> ContainerEngineResult<()>;

    /// Removes a network.
    async fn remove_network(&self, name: &str) -> ContainerEngineResult<()>;

    /// Makes `image` available locally.
    async fn pull_image(&self, image: &str) -> ContainerEngineResult<()>;

    /// Creates and starts a container.
    async fn start_container(&self, spec: &ContainerSpec) -> ContainerEngineResult<()>;

    /// Stops a container, killing it after `timeout`.
    async fn stop_container(&self, name: &str, timeout: Duration) -> ContainerEngineResult<()>;

    /// Removes a container, stopping it first when `force` is set.
    async fn remove_container(&self, name: &str, force: bool) -> ContainerEngineResult<()>;

    /// Inspects a container.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerEngineError::NotFound`] when no such container
    /// exists.
    async fn inspect_container(&self, name: &str) -> ContainerEngineResult<ContainerInspection>;

    /// Inspects a container, mapping "not found" to `None`.
    async fn container_exists(&self, name: &str)
    -> ContainerEngineResult<Option<ContainerInspection>>;

    /// Reads the combined stdout/stderr log of a container.
    async fn read_logs(&self, name: &str, follow: bool) -> ContainerEngineResult<LogStream>;
}

/// Errors returned by container engine adapters.
#[derive(Debug, Clone, Error)]
pub enum ContainerEngineError {
    /// The named object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The named object already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Generic engine failure.
    #[error("container engine error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl ContainerEngineError {
    /// Wraps a runtime error from the engine adapter.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }

    /// Returns whether this error reports an existing object.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns whether this error reports a missing object.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
