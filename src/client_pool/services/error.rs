//! Service-level errors for pooled backend connections.

use crate::client_pool::{
    domain::{ClientPoolDomainError, ServerName},
    ports::ClientError,
};
use crate::sandbox::services::SandboxError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned while acquiring, releasing or closing pooled clients.
///
/// The type is `Clone` so one creation failure can be handed to every
/// caller waiting on the same getter.
#[derive(Debug, Clone, Error)]
pub enum ClientPoolError {
    /// A descriptor value failed validation.
    #[error(transparent)]
    Domain(#[from] ClientPoolDomainError),

    /// The egress sandbox could not be provisioned.
    #[error("provisioning sandbox for {server}: {source}")]
    Sandbox {
        /// Backend name.
        server: ServerName,
        /// Orchestrator failure.
        source: SandboxError,
    },

    /// A descriptor template could not be evaluated.
    #[error("rendering template {template:?} for {server}: {reason}")]
    Template {
        /// Backend name.
        server: ServerName,
        /// Offending template.
        template: String,
        /// Renderer message.
        reason: String,
    },

    /// The backend rejected or failed the handshake.
    #[error("initializing {server}: {source}")]
    Handshake {
        /// Backend name.
        server: ServerName,
        /// Client failure.
        source: ClientError,
    },

    /// The handshake did not finish in time.
    #[error("initializing {server} timed out after {timeout:?}")]
    HandshakeTimeout {
        /// Backend name.
        server: ServerName,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// Closing a client failed.
    #[error("closing {server}: {source}")]
    Close {
        /// Backend name.
        server: ServerName,
        /// Client failure.
        source: ClientError,
    },

    /// A one-shot tool container could not be run.
    #[error("running tool container {tool}: {source}")]
    ToolRun {
        /// Tool name.
        tool: ServerName,
        /// Runner failure.
        source: ClientError,
    },

    /// The task creating the client ended before producing a result.
    #[error("creating client for {0} was aborted")]
    CreationAborted(ServerName),
}
