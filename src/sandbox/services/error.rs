//! Errors raised while provisioning or tearing down a sandbox.

use crate::sandbox::{domain::ProxySpecError, ports::ContainerEngineError};
use std::fmt;
use thiserror::Error;

/// Which of the two sandbox networks an operation concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkScope {
    /// Network joining the backend to its proxies.
    Internal,
    /// Network joining the proxies to the outside world.
    External,
}

impl fmt::Display for NetworkScope {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Internal => "internal",
            Self::External => "external",
        })
    }
}

/// Sidecar container roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarKind {
    /// Per-hostname TCP passthrough proxy.
    L4Proxy,
    /// Shared HTTP allow-list proxy.
    L7Proxy,
    /// DNS forwarder used when DNS debugging is enabled.
    DnsForwarder,
}

impl fmt::Display for SidecarKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::L4Proxy => "l4 proxy",
            Self::L7Proxy => "l7 proxy",
            Self::DnsForwarder => "dns forwarder",
        })
    }
}

/// Errors returned by the sandbox orchestrator.
#[derive(Debug, Clone, Error)]
pub enum SandboxError {
    /// An allow-list entry could not be parsed.
    #[error(transparent)]
    InvalidSpec(#[from] ProxySpecError),

    /// A sandbox network could not be created.
    #[error("creating {scope} network {name}: {source}")]
    CreateNetwork {
        /// Network role.
        scope: NetworkScope,
        /// Network name.
        name: String,
        /// Engine failure.
        source: ContainerEngineError,
    },

    /// A sidecar image could not be pulled.
    #[error("pulling image {image}: {source}")]
    PullImage {
        /// Image reference.
        image: String,
        /// Engine failure.
        source: ContainerEngineError,
    },

    /// A sidecar container could not be started.
    #[error("starting {kind} {name}: {source}")]
    StartContainer {
        /// Sidecar role.
        kind: SidecarKind,
        /// Container name.
        name: String,
        /// Engine failure.
        source: ContainerEngineError,
    },

    /// Polling a sidecar for readiness failed.
    #[error("waiting for container {name}: {source}")]
    Readiness {
        /// Container name.
        name: String,
        /// Engine failure.
        source: ContainerEngineError,
    },

    /// A sidecar never reached the running state.
    #[error("container {0} did not reach the running state")]
    NotRunning(String),

    /// A readiness poll task ended without reporting.
    #[error("readiness check aborted: {0}")]
    ReadinessAborted(String),

    /// A sidecar could not be inspected.
    #[error("inspecting container {name}: {source}")]
    Inspect {
        /// Container name.
        name: String,
        /// Engine failure.
        source: ContainerEngineError,
    },

    /// A sidecar has no address on the internal network.
    #[error("container {container} has no address on network {network}")]
    MissingAddress {
        /// Container name.
        container: String,
        /// Network name.
        network: String,
    },

    /// The DNS forwarder log could not be followed.
    #[error("reading logs for container {name}: {source}")]
    ReadLogs {
        /// Container name.
        name: String,
        /// Engine failure.
        source: ContainerEngineError,
    },

    /// A sidecar could not be stopped during teardown.
    #[error("stopping container {name}: {source}")]
    StopContainer {
        /// Container name.
        name: String,
        /// Engine failure.
        source: ContainerEngineError,
    },

    /// A sidecar could not be removed during teardown.
    #[error("removing container {name}: {source}")]
    RemoveContainer {
        /// Container name.
        name: String,
        /// Engine failure.
        source: ContainerEngineError,
    },

    /// A network could not be removed during teardown.
    #[error("removing network {name}: {source}")]
    RemoveNetwork {
        /// Network name.
        name: String,
        /// Engine failure.
        source: ContainerEngineError,
    },

    /// One or more teardown steps failed.
    #[error("sandbox teardown failed: {}", join_failures(.0))]
    Teardown(Vec<SandboxError>),
}

fn join_failures(failures: &[SandboxError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
